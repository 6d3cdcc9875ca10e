use std::path::Path;

use crate::{Config, Error};

pub(crate) fn load<P: AsRef<Path>>(path: P) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    for warning in warnings(&config) {
        log::warn!("{warning}");
    }

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> crate::Result<()> {
    let converse = &config.converse;

    if converse.max_tokens == Some(0) {
        return Err(invalid("converse.max_tokens", "must be greater than zero"));
    }

    if let Some(top_p) = converse.top_p
        && !(0.0..=1.0).contains(&top_p)
    {
        return Err(invalid("converse.top_p", format!("must be between 0 and 1, got {top_p}")));
    }

    if let Some(temperature) = converse.temperature
        && temperature < 0.0
    {
        return Err(invalid(
            "converse.temperature",
            format!("must not be negative, got {temperature}"),
        ));
    }

    Ok(())
}

pub(crate) fn warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.handoff.separator.is_empty() {
        warnings.push(
            "handoff.separator is empty, handoff instructions will be glued to the preceding tool output".to_string(),
        );
    }

    if let Some(temperature) = config.converse.temperature
        && temperature > 1.0
    {
        warnings.push(format!(
            "converse.temperature is {temperature}, several Bedrock model families reject values above 1.0"
        ));
    }

    warnings
}

fn invalid(path: &str, reason: impl Into<String>) -> Error {
    Error::InvalidValue {
        path: path.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;

    use super::{load, warnings};
    use crate::Config;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_from_file() {
        let file = write_config(indoc! {r#"
            [converse]
            service_tier = "priority"
        "#});

        let config = load(file.path()).unwrap();

        assert_eq!(config.converse.service_tier, Some(crate::ServiceTier::Priority));
        assert!(config.converse.stream_usage);
    }

    #[test]
    fn rejects_out_of_range_top_p() {
        let file = write_config(indoc! {r#"
            [converse]
            top_p = 1.5
        "#});

        let error = load(file.path()).unwrap_err();

        insta::assert_snapshot!(error, @"Invalid value for converse.top_p: must be between 0 and 1, got 1.5");
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let file = write_config(indoc! {r#"
            [converse]
            max_tokens = 0
        "#});

        let error = load(file.path()).unwrap_err();

        insta::assert_snapshot!(error, @"Invalid value for converse.max_tokens: must be greater than zero");
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let error = load("/nonexistent/weave.toml").unwrap_err();

        assert!(matches!(error, crate::Error::ConfigOpen(_)));
    }

    #[test]
    fn warns_about_empty_separator_and_high_temperature() {
        let config: Config = toml::from_str(indoc! {r#"
            [converse]
            temperature = 1.4

            [handoff]
            separator = ""
        "#})
        .unwrap();

        insta::assert_debug_snapshot!(warnings(&config), @r#"
        [
            "handoff.separator is empty, handoff instructions will be glued to the preceding tool output",
            "converse.temperature is 1.4, several Bedrock model families reject values above 1.0",
        ]
        "#);
    }
}
