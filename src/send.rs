use serde::Serialize;

use crate::{
    error::{self, Error},
    transport::{
        smtp::{ClientId, Response, SmtpRelay},
        Transport,
    },
    Context, EmailConfig, MessageBuilder, Template,
};

/// Renders the configured template against `data` and delivers it
///
/// The template is read from `config.template_path` on every call.
/// [`Error::is_retryable`] tells whether the same call may succeed later.
pub fn send<T: Serialize + ?Sized>(
    ctx: &Context,
    config: &EmailConfig,
    data: &T,
) -> Result<Response, Error> {
    if config.template_path.as_os_str().is_empty() {
        return Err(error::config("no template path configured"));
    }
    if config.smarthost.is_empty() {
        return Err(error::config("no smarthost configured"));
    }

    let template = Template::parse_file(&config.template_path).map_err(error::template)?;
    let message = MessageBuilder::new(&template, config).build(data)?;

    SmtpRelay::new(config.smarthost.to_string())
        .hello_name(ClientId::from_hello(&config.hello))
        .send(ctx, &message)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn requires_template_and_smarthost() {
        let ctx = Context::background();
        let mut config = EmailConfig {
            smarthost: "localhost:25".parse().unwrap(),
            ..Default::default()
        };
        let err = send(&ctx, &config, &json!({})).unwrap_err();
        assert!(err.is_config());
        assert!(err.is_permanent());

        config.template_path = "/tmp/template".into();
        config.smarthost = Default::default();
        let err = send(&ctx, &config, &json!({})).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn unreadable_template() {
        let config = EmailConfig {
            smarthost: "localhost:25".parse().unwrap(),
            template_path: "/nonexistent/email.tmpl".into(),
            ..Default::default()
        };
        let err = send(&Context::background(), &config, &json!({})).unwrap_err();
        assert!(err.is_template());
        assert!(!err.is_retryable());
    }
}
