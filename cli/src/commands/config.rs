use anyhow::Result;
use modelctl_core::monitor::Threshold;
use modelctl_core::Config;

const COMPONENTS: [&str; 5] = ["cpu", "memory", "disk", "gpu", "temperature"];

pub async fn execute(key: Option<&str>, value: Option<&str>) -> Result<()> {
    let mut config = Config::load()?;

    match (key, value) {
        // Show all config
        (None, None) => {
            println!("Configuration file: {:?}\n", Config::config_path()?);
            println!("[daemon]");
            println!("  host = \"{}\"", config.daemon.host);
            println!("  port = {}", config.daemon.port);
            println!();
            println!("[downloads]");
            println!("  service_url = \"{}\"", config.downloads.service_url);
            println!("  poll_interval_ms = {}", config.downloads.poll_interval_ms);
            println!("  timeout_secs = {}", config.downloads.timeout_secs);
            println!(
                "  max_concurrent = {}",
                config
                    .downloads
                    .max_concurrent
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "(unlimited)".to_string())
            );
            println!();
            println!("[monitor]");
            println!(
                "  telemetry_url = {}",
                config.monitor.telemetry_url.as_deref().unwrap_or("(push only)")
            );
            println!("  sample_interval_secs = {}", config.monitor.sample_interval_secs);
            println!("  retention_minutes = {}", config.monitor.retention_minutes);
            println!();
            println!("[runtime]");
            println!("  service_url = \"{}\"", config.runtime.service_url);
            println!("  idle_unload_minutes = {}", config.runtime.idle_unload_minutes);
            println!();
            println!("[thresholds]");
            for component in COMPONENTS {
                if let Some(t) = threshold(&mut config, component) {
                    println!("  {} = {{ warning = {}, critical = {} }}", component, t.warning, t.critical);
                }
            }
        }

        // Get a specific key
        (Some(key), None) => {
            let value = get_config_value(&mut config, key)?;
            println!("{}", value);
        }

        // Set a specific key
        (Some(key), Some(value)) => {
            set_config_value(&mut config, key, value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }

        _ => unreachable!(),
    }

    Ok(())
}

fn threshold<'a>(config: &'a mut Config, component: &str) -> Option<&'a mut Threshold> {
    let t = &mut config.thresholds;
    match component {
        "cpu" => Some(&mut t.cpu),
        "memory" => Some(&mut t.memory),
        "disk" => Some(&mut t.disk),
        "gpu" => Some(&mut t.gpu),
        "temperature" => Some(&mut t.temperature),
        _ => None,
    }
}

fn threshold_pair<'a>(config: &'a mut Config, key: &str) -> Option<&'a mut Threshold> {
    threshold(config, key.strip_prefix("thresholds.")?)
}

fn threshold_field<'a>(config: &'a mut Config, key: &str) -> Option<&'a mut f64> {
    let (component, level) = key.strip_prefix("thresholds.")?.split_once('.')?;
    let t = threshold(config, component)?;
    match level {
        "warning" => Some(&mut t.warning),
        "critical" => Some(&mut t.critical),
        _ => None,
    }
}

fn get_config_value(config: &mut Config, key: &str) -> Result<String> {
    match key {
        "daemon.host" => Ok(config.daemon.host.clone()),
        "daemon.port" => Ok(config.daemon.port.to_string()),
        "downloads.service_url" => Ok(config.downloads.service_url.clone()),
        "downloads.poll_interval_ms" => Ok(config.downloads.poll_interval_ms.to_string()),
        "downloads.timeout_secs" => Ok(config.downloads.timeout_secs.to_string()),
        "downloads.max_concurrent" => Ok(config
            .downloads
            .max_concurrent
            .map(|n| n.to_string())
            .unwrap_or_default()),
        "monitor.telemetry_url" => Ok(config.monitor.telemetry_url.clone().unwrap_or_default()),
        "monitor.sample_interval_secs" => Ok(config.monitor.sample_interval_secs.to_string()),
        "monitor.retention_minutes" => Ok(config.monitor.retention_minutes.to_string()),
        "runtime.service_url" => Ok(config.runtime.service_url.clone()),
        "runtime.idle_unload_minutes" => Ok(config.runtime.idle_unload_minutes.to_string()),
        _ => {
            if let Some(t) = threshold_pair(config, key) {
                return Ok(format!("{},{}", t.warning, t.critical));
            }
            match threshold_field(config, key) {
                Some(value) => Ok(value.to_string()),
                None => anyhow::bail!("Unknown config key: {}", key),
            }
        }
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "daemon.host" => config.daemon.host = value.to_string(),
        "daemon.port" => config.daemon.port = value.parse()?,
        "downloads.service_url" => config.downloads.service_url = value.to_string(),
        "downloads.poll_interval_ms" => config.downloads.poll_interval_ms = value.parse()?,
        "downloads.timeout_secs" => config.downloads.timeout_secs = value.parse()?,
        "downloads.max_concurrent" => {
            config.downloads.max_concurrent = if value.is_empty() {
                None
            } else {
                Some(value.parse()?)
            }
        }
        "monitor.telemetry_url" => {
            config.monitor.telemetry_url = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        "monitor.sample_interval_secs" => config.monitor.sample_interval_secs = value.parse()?,
        "monitor.retention_minutes" => config.monitor.retention_minutes = value.parse()?,
        "runtime.service_url" => config.runtime.service_url = value.to_string(),
        "runtime.idle_unload_minutes" => config.runtime.idle_unload_minutes = value.parse()?,
        _ => {
            if let Some(t) = threshold_pair(config, key) {
                let (warning, critical) = value.split_once(',').ok_or_else(|| {
                    anyhow::anyhow!("Expected <warning>,<critical> for {}, got '{}'", key, value)
                })?;
                *t = Threshold::new(warning.trim().parse()?, critical.trim().parse()?);
                config.thresholds.validate()?;
                return Ok(());
            }
            match threshold_field(config, key) {
                Some(field) => {
                    *field = value.parse()?;
                    if let Err(e) = config.thresholds.validate() {
                        let component = key.trim_start_matches("thresholds.");
                        let component = component.split('.').next().unwrap_or(component);
                        anyhow::bail!(
                            "{}. Set both levels at once with `modelctl config thresholds.{} <warning>,<critical>`",
                            e,
                            component
                        );
                    }
                }
                None => anyhow::bail!("Unknown config key: {}", key),
            }
        }
    }
    Ok(())
}
