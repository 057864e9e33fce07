use anyhow::{Context, Result, anyhow, bail};
use escola_common::Locale;
use escola_config::{PortalConfig, PortalConfigLoader, to_yaml};
use escola_content::{
    ContentView, HtmlRenderer, HttpFetcher, Pipeline, Renderer, TextRenderer,
};
use escola_support::{
    FaqMatcher, Order, quick_whatsapp_link, ussd_instructions, whatsapp_link,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::cli::{Command, OutputFormat};

pub fn load_config(path: Option<&Path>) -> Result<PortalConfig> {
    let loader = match path {
        Some(p) => PortalConfigLoader::new().with_file(p),
        None => PortalConfigLoader::new().with_default_locations(),
    };
    loader.load().context("loading configuration")
}

pub async fn run(command: Command, cfg: &PortalConfig) -> Result<()> {
    match command {
        Command::View {
            url,
            subject,
            title,
            format,
            no_prompt,
        } => {
            let (url, title) = resolve_target(cfg, url, subject, title)?;
            view(cfg, &url, title.as_deref(), format, no_prompt).await
        }
        Command::Materials => {
            for s in cfg.catalog() {
                println!("{} {} - {}", s.icon, s.name, s.description);
                if !s.topics.is_empty() {
                    println!("    {}", s.topics.join(", "));
                }
                if let Some(url) = &s.url {
                    println!("    {url}");
                }
            }
            Ok(())
        }
        Command::Ask { message } => {
            let faq = FaqMatcher::from_settings(&cfg.support);
            println!("{}", faq.respond(&message.join(" ")));
            Ok(())
        }
        Command::Order {
            product,
            price,
            name,
            whatsapp,
        } => {
            let order = Order::new(&product, price, &name, &whatsapp)?;
            let link = whatsapp_link(&order, &cfg.support.orders_whatsapp_number)?;
            println!("{}", order.id);
            println!("{link}");
            Ok(())
        }
        Command::Buy { product, price } => {
            let link = quick_whatsapp_link(&product, price, &cfg.support.whatsapp_number)?;
            println!("{link}");
            Ok(())
        }
        Command::PayUssd => {
            println!("{}", ussd_instructions(&cfg.support.ussd_code));
            Ok(())
        }
        Command::Config => {
            print!("{}", to_yaml(cfg)?);
            Ok(())
        }
    }
}

/// Turn `--url`/`--subject` into the page to open and its title.
fn resolve_target(
    cfg: &PortalConfig,
    url: Option<String>,
    subject: Option<String>,
    title: Option<String>,
) -> Result<(String, Option<String>)> {
    match (url, subject) {
        (Some(url), _) => Ok((url, title)),
        (None, Some(name)) => {
            let s = cfg
                .find_subject(&name)
                .ok_or_else(|| anyhow!("unknown subject {name:?}"))?;
            let url = s
                .url
                .with_context(|| format!("subject {:?} has no source page configured", s.name))?;
            Ok((url.to_string(), Some(s.name)))
        }
        (None, None) => bail!("either --url or --subject is required"),
    }
}

async fn view(
    cfg: &PortalConfig,
    url: &str,
    title: Option<&str>,
    format: OutputFormat,
    no_prompt: bool,
) -> Result<()> {
    let locale = cfg.locale;
    let renderer: Arc<dyn Renderer> = match format {
        OutputFormat::Html => Arc::new(HtmlRenderer),
        OutputFormat::Text => Arc::new(TextRenderer),
    };
    let fetcher = HttpFetcher::from_settings(&cfg.content)?;
    let pipeline = Pipeline::new(Arc::new(fetcher), renderer).with_locale(locale);

    let mut view = ContentView::from_params(url, title)?;
    eprintln!("{}", locale.messages().loading);
    view.load(&pipeline).await?;

    loop {
        if let Some(rendered) = view.rendered() {
            tracing::info!(
                url = %rendered.source,
                container = rendered.container.label(),
                attempts = view.attempts(),
                "app.view.rendered"
            );
            print!("{}", rendered.output);
            return Ok(());
        }
        let notice = view
            .error_notice(locale)
            .ok_or_else(|| anyhow!("view stopped in phase {:?}", view.phase()))?;
        eprintln!("{}\n  ({})", notice.message, notice.detail);

        let prompt = format!("{}? [{}] ", notice.retry_label, yes_no_hint(locale));
        if no_prompt || !confirm(locale, &prompt).await? {
            bail!("{}: {}", notice.message, notice.detail);
        }
        eprintln!("{}", locale.messages().loading);
        view.retry(&pipeline).await?;
    }
}

fn yes_no_hint(locale: Locale) -> &'static str {
    match locale {
        Locale::Pt => "s/N",
        Locale::En => "y/N",
    }
}

async fn confirm(locale: Locale, prompt: &str) -> Result<bool> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(prompt.as_bytes()).await?;
    stderr.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    // EOF counts as "no".
    Ok(read > 0 && locale.is_affirmative(&line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use escola_config::Subject;

    fn cfg_with_linked_subject() -> PortalConfig {
        PortalConfig {
            materials: vec![Subject {
                name: "Física".into(),
                icon: "⚛️".into(),
                description: String::new(),
                topics: vec![],
                url: Some("https://blog.example.com/fisica".parse().unwrap()),
            }],
            ..PortalConfig::default()
        }
    }

    #[test]
    fn explicit_url_keeps_title() {
        let (url, title) = resolve_target(
            &PortalConfig::default(),
            Some("https://a.example/x".into()),
            None,
            Some("X".into()),
        )
        .unwrap();
        assert_eq!(url, "https://a.example/x");
        assert_eq!(title.as_deref(), Some("X"));
    }

    #[test]
    fn subject_opens_its_page_with_its_name() {
        let (url, title) =
            resolve_target(&cfg_with_linked_subject(), None, Some("física".into()), None).unwrap();
        assert_eq!(url, "https://blog.example.com/fisica");
        assert_eq!(title.as_deref(), Some("Física"));
    }

    #[test]
    fn subject_without_page_or_unknown_is_an_error() {
        let cfg = PortalConfig::default();
        let err = resolve_target(&cfg, None, Some("Química".into()), None).unwrap_err();
        assert!(err.to_string().contains("no source page"));
        assert!(resolve_target(&cfg, None, Some("Latim".into()), None).is_err());
    }

    #[test]
    fn hint_follows_locale() {
        assert_eq!(yes_no_hint(Locale::Pt), "s/N");
        assert!(Locale::Pt.is_affirmative("S\n"));
    }
}
