use std::sync::Arc;

use domain::command::{self, LabelLanguage, Raster, escpos, tspl, universal};
use domain::{PrinterError, PrinterStatus};
use thiserror::Error;
use tracing::{info, warn};

use crate::manager::DeviceManager;
use crate::registry::PrinterRegistry;

/// Reasons a status-checked print is held back
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrintRefusal {
    #[error("Paper is out! Please load paper.")]
    PaperOut,

    #[error("Cover is open! Please close cover.")]
    CoverOpen,

    #[error("Printer error: {0}")]
    Fault(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrintError {
    #[error(transparent)]
    Refused(#[from] PrintRefusal),

    #[error(transparent)]
    Printer(#[from] PrinterError),
}

/// Refuse on paper out, cover open, or an error flag backed by a non-zero
/// status byte
pub fn check_status(status: &PrinterStatus) -> Result<(), PrintRefusal> {
    if status.paper_out {
        return Err(PrintRefusal::PaperOut);
    }
    if status.cover_open {
        return Err(PrintRefusal::CoverOpen);
    }
    if status.has_error && status.raw_status != 0 {
        return Err(PrintRefusal::Fault(status.message.clone()));
    }
    Ok(())
}

/// Print jobs against whichever manager is active
pub struct PrintService {
    registry: Arc<PrinterRegistry>,
}

impl PrintService {
    pub fn new(registry: Arc<PrinterRegistry>) -> Self {
        Self { registry }
    }

    fn manager(&self) -> Arc<DeviceManager> {
        self.registry.active()
    }

    pub async fn print_bytes(&self, data: &[u8]) -> Result<(), PrintError> {
        self.manager().try_print(data).await?;
        Ok(())
    }

    pub async fn print_label(&self, text: &str, language: LabelLanguage) -> Result<(), PrintError> {
        info!(language = %language, "Printing label");
        self.print_bytes(&command::encode_label(text, language)).await
    }

    pub async fn print_test_label(&self, language: LabelLanguage) -> Result<(), PrintError> {
        info!(language = %language, "Printing test label");
        self.print_bytes(&command::test_label(language)).await
    }

    /// Receipt-style page naming the active link and device
    pub async fn print_test_page(&self) -> Result<(), PrintError> {
        let manager = self.manager();
        let device = manager.connected_device();
        let page = escpos::receipt_test_page(manager.kind(), device.as_ref());
        self.print_bytes(&page).await
    }

    pub async fn print_universal_test(&self) -> Result<(), PrintError> {
        self.print_bytes(&universal::test_label()).await
    }

    /// Text with no control codes at all
    pub async fn print_raw(&self, text: &str) -> Result<(), PrintError> {
        self.print_bytes(&universal::raw_label(text)).await
    }

    /// Wrapped TSPL text on a 102 mm label
    pub async fn print_long_text(&self, text: &str) -> Result<(), PrintError> {
        self.print_bytes(&tspl::long_text(text, tspl::DEFAULT_MAX_CHARS)).await
    }

    pub async fn print_raster(&self, raster: &Raster, language: LabelLanguage) -> Result<(), PrintError> {
        let data = match language {
            LabelLanguage::Tspl => tspl::bitmap(raster),
            LabelLanguage::EscPos => escpos::bitmap(raster),
            LabelLanguage::Zpl | LabelLanguage::Epl | LabelLanguage::Cpcl => {
                return Err(PrinterError::Unsupported("bitmap printing in this language").into());
            }
        };
        self.print_bytes(&data).await
    }

    /// Probe status first when the link can answer, then print
    pub async fn print_checked(&self, data: &[u8]) -> Result<(), PrintError> {
        let manager = self.manager();

        if manager.can_read().await {
            if let Some(status) = manager.query_status().await {
                check_status(&status).inspect_err(|refusal| warn!("Print refused: {}", refusal))?;
            }
        } else {
            warn!("Printer is write-only, skipping status check");
        }

        manager.try_print(data).await?;
        Ok(())
    }

    /// TSPL self test behind the status check
    pub async fn print_simple_test(&self, text: &str) -> Result<(), PrintError> {
        self.print_checked(&tspl::simple_test(text)).await
    }
}
