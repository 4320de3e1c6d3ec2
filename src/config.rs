//! Settings resolution for the CLI.

mod duration;

pub use duration::parse_duration;

use crate::SamplerOpts;
use anyhow::Context;
use rocketmq_send_sampler::{SamplerConfig, SamplerSettings};

/// Build sampler settings from an optional YAML file and CLI flags.
///
/// Flags that are set override the file field by field.
pub fn resolve_settings(opts: &SamplerOpts) -> anyhow::Result<SamplerSettings> {
    let mut settings = match &opts.config {
        Some(path) => SamplerSettings::from_file(path)
            .with_context(|| format!("Failed to load sampler settings from {path:?}"))?,
        None => SamplerSettings::default(),
    };

    if let Some(label) = &opts.label {
        settings.label = Some(label.clone());
    }
    if let Some(host) = &opts.namesrv_host {
        settings.name_server_host = host.clone();
    }
    if let Some(port) = opts.namesrv_port {
        settings.name_server_port = port;
    }
    if let Some(group) = &opts.producer_group {
        settings.producer_group = group.clone();
    }
    if let Some(topic) = &opts.topic {
        settings.topic = topic.clone();
    }
    if let Some(tag) = &opts.tag {
        settings.tag = tag.clone();
    }
    if let Some(body) = &opts.body {
        settings.body = body.clone();
    }
    if let Some(path) = &opts.body_file {
        settings.body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message body from {path:?}"))?;
    }
    if let Some(encoding) = opts.body_encoding {
        settings.body_encoding = encoding.into();
    }
    if let Some(timeout) = opts.timeout {
        settings.timeout_ms = timeout.as_millis() as u64;
    }
    if let Some(method) = &opts.send_method {
        settings.send_method = Some(method.clone());
    }

    Ok(settings)
}

/// Resolve and validate into the config the sampler runs with.
pub fn resolve_config(opts: &SamplerOpts) -> anyhow::Result<SamplerConfig> {
    resolve_settings(opts)?
        .validate()
        .context("Invalid sampler settings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BodyEncodingArg;
    use rocketmq_send_sampler::{BodyEncoding, SendMode};
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_flags_only() {
        let opts = SamplerOpts {
            namesrv_host: Some("10.0.0.1".to_string()),
            producer_group: Some("bench".to_string()),
            topic: Some("T1".to_string()),
            body: Some("hello".to_string()),
            timeout: Some(Duration::from_millis(1500)),
            send_method: Some("oneway".to_string()),
            ..Default::default()
        };
        let config = resolve_config(&opts).unwrap();
        assert_eq!(config.name_server_addr(), "10.0.0.1:9876");
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.send_mode(), SendMode::OneWay);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name_server_host: file-host\nname_server_port: 10876\nproducer_group: file_group\ntopic: FileTopic\nbody: from-file\nsend_method: method.async"
        )
        .unwrap();

        let opts = SamplerOpts {
            config: Some(file.path().to_path_buf()),
            topic: Some("FlagTopic".to_string()),
            body_encoding: Some(BodyEncodingArg::Utf8),
            ..Default::default()
        };
        let settings = resolve_settings(&opts).unwrap();
        assert_eq!(settings.name_server_host, "file-host");
        assert_eq!(settings.name_server_port, 10876);
        assert_eq!(settings.producer_group, "file_group");
        assert_eq!(settings.topic, "FlagTopic");
        assert_eq!(settings.body, "from-file");
        assert_eq!(settings.body_encoding, BodyEncoding::Utf8);
        assert_eq!(settings.validate().unwrap().send_mode(), SendMode::Async);
    }

    #[test]
    fn test_body_file() {
        let mut body = tempfile::NamedTempFile::new().unwrap();
        write!(body, "{{\"order\": 42}}").unwrap();

        let opts = SamplerOpts {
            body_file: Some(body.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(resolve_settings(&opts).unwrap().body, "{\"order\": 42}");
    }

    #[test]
    fn test_missing_required_fields() {
        let err = resolve_config(&SamplerOpts::default()).unwrap_err();
        assert!(format!("{err:#}").contains("name_server_host"));
    }
}
