//! Answers device permission prompts from the terminal

use infrastructure::PermissionPrompt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// `y`/`yes` grant, anything else denies
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask about each prompt on `output` and resolve it from the next line of
/// `input`. End of input denies whatever is still pending.
pub async fn answer_prompts<R, W>(mut prompts: mpsc::UnboundedReceiver<PermissionPrompt>, input: R, mut output: W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(prompt) = prompts.recv().await {
        let question = format!(
            "Allow access to {} ({})? [y/N] ",
            prompt.device.name, prompt.device.address
        );
        if let Err(e) = ask(&mut output, &question).await {
            warn!(error = %e, "Unable to show permission prompt");
        }

        let granted = match lines.next_line().await {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Unable to read permission answer");
                false
            }
        };

        info!(address = %prompt.device.address, granted, "Permission answered");
        prompt.responder.resolve(granted);
    }
}

async fn ask<W: AsyncWrite + Unpin>(output: &mut W, question: &str) -> std::io::Result<()> {
    output.write_all(question.as_bytes()).await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Device, TransportKind};
    use infrastructure::PermissionRequest;
    use std::time::Duration;

    fn prompt_for(address: &str) -> (PermissionPrompt, PermissionRequest) {
        let (responder, request) = PermissionRequest::pair();
        let prompt = PermissionPrompt {
            device: Device::new("USB Printer", address, TransportKind::UsbBulk),
            responder,
        };
        (prompt, request)
    }

    #[test]
    fn test_affirmative_answers() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES \n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
    }

    #[tokio::test]
    async fn test_answers_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (first, first_request) = prompt_for("/dev/bus/usb/001/004");
        let (second, second_request) = prompt_for("/dev/bus/usb/001/005");
        tx.send(first).unwrap();
        tx.send(second).unwrap();
        drop(tx);

        let mut output = Vec::new();
        answer_prompts(rx, &b"y\nn\n"[..], &mut output).await;

        assert!(first_request.wait(Duration::from_secs(1)).await);
        assert!(!second_request.wait(Duration::from_secs(1)).await);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Allow access to USB Printer (/dev/bus/usb/001/004)?"));
    }

    #[tokio::test]
    async fn test_end_of_input_denies() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (prompt, request) = prompt_for("/dev/bus/usb/001/004");
        tx.send(prompt).unwrap();
        drop(tx);

        answer_prompts(rx, &b""[..], tokio::io::sink()).await;
        assert!(!request.wait(Duration::from_secs(1)).await);
    }
}
