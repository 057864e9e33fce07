use escola_config::{FaqEntrySpec, SupportSettings};

/// One keyword and the canned answer it triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqEntry {
    /// Lowercase; matched as a substring of the lowercased message.
    pub keyword: String,
    pub response: String,
}

/// Ordered keyword table; the first keyword contained in a message wins.
#[derive(Debug, Clone)]
pub struct FaqMatcher {
    entries: Vec<FaqEntry>,
    welcome: String,
    fallback: String,
}

impl FaqMatcher {
    /// Build the matcher for the given support contacts.
    ///
    /// Configured entries replace the built-in table. Their responses may use
    /// the `{ussd}`, `{whatsapp}` and `{email}` placeholders.
    ///
    /// ```
    /// use escola_config::SupportSettings;
    /// use escola_support::FaqMatcher;
    ///
    /// let faq = FaqMatcher::from_settings(&SupportSettings::default());
    /// assert!(faq.respond("Qual é o PREÇO?").contains("/shop"));
    /// ```
    pub fn from_settings(settings: &SupportSettings) -> Self {
        let entries = if settings.faq.is_empty() {
            default_entries(settings)
        } else {
            settings
                .faq
                .iter()
                .filter(|e| !e.keyword.trim().is_empty())
                .map(|FaqEntrySpec { keyword, response }| FaqEntry {
                    keyword: keyword.trim().to_lowercase(),
                    response: fill(response, settings),
                })
                .collect()
        };
        tracing::debug!(entries = entries.len(), "support.faq.ready");
        Self {
            entries,
            welcome: "Olá! Bem-vindo ao suporte da Escola Digital MZ. Como posso ajudar?".into(),
            fallback: format!(
                "Obrigado pela sua mensagem! Nossa equipe irá responder em breve. \
                 Para questões urgentes, contacte-nos via email: {}",
                settings.email
            ),
        }
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    /// Greeting shown when a chat opens.
    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    /// Answer for a user message, or the hand-over fallback.
    pub fn respond(&self, message: &str) -> &str {
        self.lookup(message).unwrap_or(&self.fallback)
    }

    /// Matched answer only; `None` when no keyword hits.
    pub fn lookup(&self, message: &str) -> Option<&str> {
        let lower = message.to_lowercase();
        let hit = self.entries.iter().find(|e| lower.contains(&e.keyword));
        match hit {
            Some(entry) => {
                tracing::debug!(keyword = %entry.keyword, "support.faq.hit");
                Some(&entry.response)
            }
            None => {
                tracing::debug!(chars = message.chars().count(), "support.faq.miss");
                None
            }
        }
    }
}

fn fill(template: &str, settings: &SupportSettings) -> String {
    template
        .replace("{ussd}", &settings.ussd_code)
        .replace("{whatsapp}", &settings.whatsapp_number)
        .replace("{email}", &settings.email)
}

fn default_entries(settings: &SupportSettings) -> Vec<FaqEntry> {
    const GREETING: &str = "Olá! Como posso ajudar você hoje? 😊";
    const PRICES: &str =
        "Os preços dos nossos produtos variam. Visite a nossa loja para ver todos os preços: /shop";
    const HOURS: &str = "Estamos disponíveis de Segunda a Sábado, das 07:00 às 17:00";

    let table: [(&str, &str); 10] = [
        ("olá", GREETING),
        ("ola", GREETING),
        ("preço", PRICES),
        ("preco", PRICES),
        (
            "como comprar",
            "Para comprar, escolha um produto na loja e selecione o método de pagamento \
             (USSD {ussd} ou WhatsApp)",
        ),
        (
            "pagamento",
            "Aceitamos pagamento via USSD ({ussd}) ou WhatsApp ({whatsapp})",
        ),
        ("horário", HOURS),
        ("horario", HOURS),
        ("email", "Nosso email de suporte é: {email}"),
        (
            "ajuda",
            "Posso ajudar com informações sobre produtos, pagamentos e matérias. Como posso ajudar?",
        ),
    ];
    table
        .into_iter()
        .map(|(keyword, response)| FaqEntry {
            keyword: keyword.to_string(),
            response: fill(response, settings),
        })
        .collect()
}
