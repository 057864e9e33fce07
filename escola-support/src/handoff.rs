//! Payment hand-off: the portal never charges anyone, it only prepares the
//! WhatsApp message or USSD instructions the customer completes by hand.

use serde::Serialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

const WHATSAPP_BASE: &str = "https://wa.me/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("not a usable WhatsApp number: {0:?}")]
    InvalidNumber(String),
}

/// A checkout request waiting for manual confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub product_title: String,
    /// Whole meticais.
    pub price_mt: u32,
    pub customer_name: String,
    pub customer_whatsapp: String,
}

impl Order {
    pub fn new(
        product_title: &str,
        price_mt: u32,
        customer_name: &str,
        customer_whatsapp: &str,
    ) -> Result<Self, HandoffError> {
        let order = Self {
            id: Uuid::new_v4(),
            product_title: required("product", product_title)?,
            price_mt,
            customer_name: required("name", customer_name)?,
            customer_whatsapp: required("whatsapp", customer_whatsapp)?,
        };
        tracing::info!(
            order_id = %order.id,
            product = %order.product_title,
            price_mt = order.price_mt,
            "support.order.created"
        );
        Ok(order)
    }

    /// Text sent to the orders line.
    pub fn message(&self) -> String {
        format!(
            "Ola, Gostaria de efectuar a compra: {}\n\nProduto: {}\nValor: {} MT\nNome: {}",
            self.id, self.product_title, self.price_mt, self.customer_name
        )
    }
}

fn required(field: &'static str, value: &str) -> Result<String, HandoffError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(HandoffError::MissingField(field));
    }
    Ok(value.to_string())
}

/// `https://wa.me/<digits>?text=<order message>` for the orders number.
///
/// ```
/// use escola_support::{Order, whatsapp_link};
///
/// let order = Order::new("Apostila de Física", 250, "Ana", "841234567").unwrap();
/// let link = whatsapp_link(&order, "+258 85 398 4699").unwrap();
/// assert!(link.as_str().starts_with("https://wa.me/258853984699?text="));
/// ```
pub fn whatsapp_link(order: &Order, number: &str) -> Result<Url, HandoffError> {
    chat_link(number, &order.message())
}

/// One-click variant used from a product page, without an order id.
pub fn quick_whatsapp_link(
    product_title: &str,
    price_mt: u32,
    number: &str,
) -> Result<Url, HandoffError> {
    let title = required("product", product_title)?;
    chat_link(number, &format!("Olá! Quero comprar: {title} por {price_mt} MT"))
}

pub fn ussd_instructions(code: &str) -> String {
    format!("Disque {code} no seu telemóvel e siga as instruções para completar o pagamento.")
}

fn chat_link(number: &str, text: &str) -> Result<Url, HandoffError> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(HandoffError::InvalidNumber(number.to_string()));
    }
    let mut url = Url::parse(WHATSAPP_BASE)
        .and_then(|base| base.join(&digits))
        .map_err(|_| HandoffError::InvalidNumber(number.to_string()))?;
    url.query_pairs_mut().append_pair("text", text);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_param(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "text")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn order_requires_every_field() {
        assert_eq!(
            Order::new(" ", 10, "Ana", "84").unwrap_err(),
            HandoffError::MissingField("product")
        );
        assert_eq!(
            Order::new("Livro", 10, "", "84").unwrap_err(),
            HandoffError::MissingField("name")
        );
        assert_eq!(
            Order::new("Livro", 10, "Ana", "\t").unwrap_err(),
            HandoffError::MissingField("whatsapp")
        );
    }

    #[test]
    fn orders_get_distinct_ids() {
        let a = Order::new("Livro", 10, "Ana", "84").unwrap();
        let b = Order::new("Livro", 10, "Ana", "84").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.customer_name, "Ana");
    }

    #[test]
    fn order_link_carries_full_message() {
        let order = Order::new("Guia de Química", 350, " João ", "+258 84 111 2222").unwrap();
        let link = whatsapp_link(&order, "+258 85 398 4699").unwrap();
        assert_eq!(link.host_str(), Some("wa.me"));
        assert_eq!(link.path(), "/258853984699");
        assert_eq!(
            text_param(&link),
            format!(
                "Ola, Gostaria de efectuar a compra: {}\n\nProduto: Guia de Química\nValor: 350 MT\nNome: João",
                order.id
            )
        );
        assert!(!link.as_str().contains('\n'));
    }

    #[test]
    fn quick_link_uses_short_message() {
        let link = quick_whatsapp_link("Resumos & Exercícios", 99, "258871009140").unwrap();
        assert_eq!(link.path(), "/258871009140");
        assert_eq!(
            text_param(&link),
            "Olá! Quero comprar: Resumos & Exercícios por 99 MT"
        );
    }

    #[test]
    fn number_without_digits_is_rejected() {
        assert_eq!(
            quick_whatsapp_link("Livro", 1, "n/a").unwrap_err(),
            HandoffError::InvalidNumber("n/a".into())
        );
    }

    #[test]
    fn ussd_text_names_the_code() {
        assert_eq!(
            ussd_instructions("*898#"),
            "Disque *898# no seu telemóvel e siga as instruções para completar o pagamento."
        );
    }

    #[test]
    fn order_serializes_for_logs() {
        let order = Order::new("Livro", 10, "Ana", "84").unwrap();
        let v = serde_json::to_value(&order).unwrap();
        assert_eq!(v["price_mt"], 10);
        assert_eq!(v["id"], order.id.to_string());
    }
}
