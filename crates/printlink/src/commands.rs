use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use application::{DeviceManager, PrintService, PrinterRegistry};
use domain::command::{self, LabelLanguage, Raster};
use domain::status::hex_preview;
use domain::{Device, TransportKind};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::cli::Target;

/// One transport's scan outcome
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub transport: TransportKind,
    pub devices: Vec<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scan `transport`, or every transport. Fails only when nothing could be
/// scanned at all.
pub async fn scan(registry: &PrinterRegistry, transport: Option<TransportKind>, json: bool) -> Result<()> {
    let kinds = transport.map_or_else(|| TransportKind::ALL.to_vec(), |kind| vec![kind]);

    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let report = match registry.manager(kind).scan().await {
            Ok(devices) => ScanReport { transport: kind, devices, error: None },
            Err(e) => ScanReport { transport: kind, devices: Vec::new(), error: Some(e.to_string()) },
        };
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}:", report.transport.display_name());
            if let Some(error) = &report.error {
                println!("  ! {}", error);
            } else if report.devices.is_empty() {
                println!("  (none)");
            }
            for device in &report.devices {
                println!("  {:<40} {}", device.name, device.address);
            }
        }
    }

    if reports.iter().all(|r| r.error.is_some()) {
        bail!("No transport could be scanned");
    }
    Ok(())
}

/// Select the target's manager and connect to it. A device the transport
/// lists keeps its friendly name; anything else is tried by address.
pub async fn connect(registry: &PrinterRegistry, target: &Target) -> Result<Arc<DeviceManager>> {
    let manager = registry.select(target.transport);

    if let Err(e) = manager.scan().await {
        warn!(error = %e, "Scan before connect failed, trying the address directly");
    }
    let device = manager
        .devices()
        .into_iter()
        .find(|d| d.address == target.address)
        .unwrap_or_else(|| Device::new(target.address.clone(), target.address.clone(), target.transport));

    manager
        .connect(&device)
        .await
        .with_context(|| format!("Unable to connect to {} over {}", device.address, target.transport))?;
    Ok(manager)
}

pub enum PrintJob<'a> {
    Text { text: &'a str, language: LabelLanguage },
    File(&'a Path),
    Image { path: &'a Path, language: LabelLanguage },
}

pub async fn print(service: &PrintService, job: PrintJob<'_>, check_status: bool) -> Result<()> {
    match job {
        PrintJob::Image { path, language } => {
            let raster = load_raster(path)?;
            info!(width = raster.width(), height = raster.height(), "Printing image");
            service.print_raster(&raster, language).await?;
        }
        PrintJob::Text { text, language } if !check_status => {
            service.print_label(text, language).await?;
        }
        PrintJob::Text { text, language } => {
            service.print_checked(&command::encode_label(text, language)).await?;
        }
        PrintJob::File(path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("Unable to read {}", path.display()))?;
            if check_status {
                service.print_checked(&data).await?;
            } else {
                service.print_bytes(&data).await?;
            }
        }
    }
    println!("Printed");
    Ok(())
}

fn load_raster(path: &Path) -> Result<Raster> {
    let image = image::open(path).with_context(|| format!("Unable to decode {}", path.display()))?;
    Ok(Raster::from_image(&image))
}

pub async fn test_label(service: &PrintService, language: LabelLanguage, universal: bool) -> Result<()> {
    if universal {
        service.print_universal_test().await?;
    } else {
        service.print_test_label(language).await?;
    }
    println!("Test label sent");
    Ok(())
}

pub async fn status(manager: &DeviceManager, json: bool) -> Result<()> {
    let status = manager
        .query_status()
        .await
        .ok_or_else(|| anyhow!("Printer not connected"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Status:  {}", status.status_text());
        println!("Message: {}", status.message);
        println!("Raw:     0x{:02X}", status.raw_status);
    }
    Ok(())
}

pub async fn info(manager: &DeviceManager) -> Result<()> {
    match manager.query_printer_info().await {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => bail!("Printer did not answer the info query"),
    }
}

/// Echo every chunk the read loop publishes until `duration` passes or
/// Ctrl-C arrives
pub async fn listen(manager: &DeviceManager, duration: Duration) -> Result<()> {
    if !manager.can_read().await {
        bail!("{} links are write-only", manager.kind().display_name());
    }

    let mut received = manager.watch_received();
    received.borrow_and_update();

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    info!(seconds = duration.as_secs(), "👂 Listening for printer data");
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Stopping");
                break;
            }
            changed = received.changed() => {
                if changed.is_err() {
                    break;
                }
                let chunk = received.borrow_and_update().clone();
                if let Some(chunk) = chunk {
                    println!(
                        "[{}] {} | {}",
                        chunk.received_at.format("%H:%M:%S%.3f"),
                        hex_preview(&chunk.bytes, 32),
                        chunk.text()
                    );
                }
            }
        }
    }
    Ok(())
}

/// Encoder output for `language`; the fixed test label without text
pub fn encode(language: LabelLanguage, text: Option<&str>) -> Vec<u8> {
    match text {
        Some(text) => command::encode_label(text, language),
        None => command::test_label(language),
    }
}

pub async fn write_encoded(data: &[u8], out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            tokio::fs::write(path, data)
                .await
                .with_context(|| format!("Unable to write {}", path.display()))?;
            info!(bytes = data.len(), path = %path.display(), "Encoded job written");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
