//! Runtime access grants for permission-gated links.
//!
//! A connect on a gated transport asks the broker first. If access has not
//! been granted yet the broker hands out a [`PermissionRequest`], which some
//! external party (an operator prompt, a policy) resolves exactly once. The
//! connect races that resolution against a timeout; whichever comes first
//! wins and the other is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::{ConnectError, Device};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Pending answer to one permission request
#[derive(Debug)]
pub struct PermissionRequest {
    rx: oneshot::Receiver<bool>,
}

impl PermissionRequest {
    /// Linked responder/request pair
    pub fn pair() -> (PermissionResponder, PermissionRequest) {
        let (tx, rx) = oneshot::channel();
        (
            PermissionResponder {
                tx: Mutex::new(Some(tx)),
                on_grant: None,
            },
            PermissionRequest { rx },
        )
    }

    /// A request that is already answered
    pub fn resolved(granted: bool) -> Self {
        let (responder, request) = Self::pair();
        responder.resolve(granted);
        request
    }

    /// Wait for the answer. A timeout, or a responder dropped without
    /// answering, counts as a denial.
    pub async fn wait(self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(granted)) => granted,
            Ok(Err(_)) => {
                debug!("Permission responder dropped without answering");
                false
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Permission request timed out");
                false
            }
        }
    }
}

type GrantHook = Box<dyn Fn() + Send + Sync>;

/// Answering side of a [`PermissionRequest`]. Only the first answer counts.
pub struct PermissionResponder {
    tx: Mutex<Option<oneshot::Sender<bool>>>,
    on_grant: Option<GrantHook>,
}

impl PermissionResponder {
    /// Returns `true` if this call delivered the answer
    pub fn resolve(&self, granted: bool) -> bool {
        let sender = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(sender) = sender else {
            return false;
        };
        if granted {
            if let Some(hook) = &self.on_grant {
                hook();
            }
        }
        // the requester may have timed out already
        sender.send(granted).is_ok()
    }

    pub fn is_resolved(&self) -> bool {
        match self.tx.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl std::fmt::Debug for PermissionResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResponder")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait PermissionBroker: Send + Sync {
    fn has_permission(&self, device: &Device) -> bool;

    /// Start a request for `device`; resolution happens elsewhere
    fn request_permission(&self, device: &Device) -> PermissionRequest;
}

/// Ensure `device` may be opened, suspending until the broker answers or
/// `timeout` elapses
pub async fn ensure_permission(
    broker: &dyn PermissionBroker,
    device: &Device,
    timeout: Duration,
) -> Result<(), ConnectError> {
    if broker.has_permission(device) {
        return Ok(());
    }

    info!(address = %device.address, "Requesting device permission");
    if broker.request_permission(device).wait(timeout).await {
        info!(address = %device.address, "Device permission granted");
        Ok(())
    } else {
        warn!(address = %device.address, "Device permission denied");
        Err(ConnectError::PermissionDenied)
    }
}

/// Grants everything; for hosts where access is governed by file modes alone
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllBroker;

impl PermissionBroker for AllowAllBroker {
    fn has_permission(&self, _device: &Device) -> bool {
        true
    }

    fn request_permission(&self, _device: &Device) -> PermissionRequest {
        PermissionRequest::resolved(true)
    }
}

/// A permission question published to whoever answers prompts
#[derive(Debug)]
pub struct PermissionPrompt {
    pub device: Device,
    pub responder: PermissionResponder,
}

/// Forwards each request as a [`PermissionPrompt`] and remembers grants for
/// the rest of the session
#[derive(Debug, Clone)]
pub struct ChannelPermissionBroker {
    granted: Arc<Mutex<HashSet<String>>>,
    prompts: mpsc::UnboundedSender<PermissionPrompt>,
}

impl ChannelPermissionBroker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PermissionPrompt>) {
        let (prompts, rx) = mpsc::unbounded_channel();
        (
            Self {
                granted: Arc::new(Mutex::new(HashSet::new())),
                prompts,
            },
            rx,
        )
    }

    fn remember(granted: &Mutex<HashSet<String>>, address: String) {
        match granted.lock() {
            Ok(mut set) => set.insert(address),
            Err(poisoned) => poisoned.into_inner().insert(address),
        };
    }
}

impl PermissionBroker for ChannelPermissionBroker {
    fn has_permission(&self, device: &Device) -> bool {
        match self.granted.lock() {
            Ok(set) => set.contains(&device.address),
            Err(poisoned) => poisoned.into_inner().contains(&device.address),
        }
    }

    fn request_permission(&self, device: &Device) -> PermissionRequest {
        let (mut responder, request) = PermissionRequest::pair();
        let granted = Arc::clone(&self.granted);
        let address = device.address.clone();
        responder.on_grant = Some(Box::new(move || Self::remember(&granted, address.clone())));

        let prompt = PermissionPrompt {
            device: device.clone(),
            responder,
        };
        if self.prompts.send(prompt).is_err() {
            // nobody listens; the dropped responder reads as a denial
            debug!(address = %device.address, "No permission responder attached");
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TransportKind;

    fn usb_device() -> Device {
        Device::new("USB Printer (0x0fe6:0x811e)", "/dev/bus/usb/001/004", TransportKind::UsbBulk)
    }

    #[tokio::test]
    async fn test_responder_resolves_once() {
        let (responder, request) = PermissionRequest::pair();
        assert!(responder.resolve(true));
        assert!(!responder.resolve(false));
        assert!(responder.is_resolved());
        assert!(request.wait(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_denial() {
        let (responder, request) = PermissionRequest::pair();
        assert!(!request.wait(Duration::from_secs(30)).await);
        // a late answer is swallowed
        assert!(!responder.resolve(true));
    }

    #[tokio::test]
    async fn test_dropped_responder_is_denial() {
        let (responder, request) = PermissionRequest::pair();
        drop(responder);
        assert!(!request.wait(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_ensure_permission_skips_request_when_granted() {
        let mut broker = MockPermissionBroker::new();
        broker.expect_has_permission().return_const(true);
        broker.expect_request_permission().never();

        let result = ensure_permission(&broker, &usb_device(), Duration::from_secs(30)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_permission_maps_denial() {
        let mut broker = MockPermissionBroker::new();
        broker.expect_has_permission().return_const(false);
        broker
            .expect_request_permission()
            .times(1)
            .returning(|_| PermissionRequest::resolved(false));

        let result = ensure_permission(&broker, &usb_device(), Duration::from_secs(30)).await;
        assert_eq!(result, Err(ConnectError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_channel_broker_caches_grant() {
        let (broker, mut prompts) = ChannelPermissionBroker::new();
        let device = usb_device();
        assert!(!broker.has_permission(&device));

        let answer = tokio::spawn(async move {
            let prompt = prompts.recv().await.unwrap();
            assert_eq!(prompt.device.address, "/dev/bus/usb/001/004");
            prompt.responder.resolve(true)
        });

        let result = ensure_permission(&broker, &device, Duration::from_secs(30)).await;
        assert!(result.is_ok());
        assert!(answer.await.unwrap());
        assert!(broker.has_permission(&device));
    }

    #[tokio::test]
    async fn test_channel_broker_without_listener_denies() {
        let (broker, prompts) = ChannelPermissionBroker::new();
        drop(prompts);
        let result = ensure_permission(&broker, &usb_device(), Duration::from_secs(30)).await;
        assert_eq!(result, Err(ConnectError::PermissionDenied));
    }
}
