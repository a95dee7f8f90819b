use std::sync::Arc;

use application::{
    ManagerTimings, PrintError, PrintRefusal, PrintService, PrinterRegistry, StatusProbe,
};
use domain::command::{self, LabelLanguage, tspl};
use domain::status::queries::TSC_STATUS;
use domain::{ConnectionState, Device, TransportKind};
use infrastructure::{MockControl, MockTransport};

struct Harness {
    registry: Arc<PrinterRegistry>,
    serial: MockControl,
    usb: MockControl,
    tcp: MockControl,
}

fn harness() -> Harness {
    let (serial, serial_control) = MockTransport::new(TransportKind::Serial);
    let (usb, usb_control) = MockTransport::new(TransportKind::UsbBulk);
    let (bluetooth, _) = MockTransport::new(TransportKind::BluetoothRfcomm);
    let (tcp, tcp_control) = MockTransport::new(TransportKind::TcpSocket);

    let registry = PrinterRegistry::new(
        Box::new(serial),
        Box::new(usb),
        Box::new(bluetooth),
        Box::new(tcp),
        ManagerTimings::default(),
        StatusProbe::default(),
    );
    Harness {
        registry: Arc::new(registry),
        serial: serial_control,
        usb: usb_control,
        tcp: tcp_control,
    }
}

fn usb_printer() -> Device {
    Device::new("USB Printer (0fe6:811e)", "/dev/bus/usb/001/004", TransportKind::UsbBulk)
}

#[tokio::test(start_paused = true)]
async fn test_managers_keep_state_across_selection() {
    let h = harness();
    assert_eq!(h.registry.active_kind(), TransportKind::Serial);

    let usb = h.registry.select(TransportKind::UsbBulk);
    usb.connect(&usb_printer()).await.unwrap();

    h.registry.select(TransportKind::TcpSocket);
    assert_eq!(h.registry.active().kind(), TransportKind::TcpSocket);
    assert_eq!(
        h.registry.connection_state_for(TransportKind::UsbBulk),
        ConnectionState::Connected
    );
    assert_eq!(
        h.registry.connection_state_for(TransportKind::TcpSocket),
        ConnectionState::Disconnected
    );

    h.registry.shutdown().await;
    assert_eq!(
        h.registry.connection_state_for(TransportKind::UsbBulk),
        ConnectionState::Disconnected
    );
    assert_eq!(h.usb.disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_printer_goes_to_tcp_manager() {
    let h = harness();
    let device = h.registry.add_manual_device("Dock", "10.0.0.5", 9100).await.unwrap();
    assert_eq!(device.address, "10.0.0.5:9100");

    let tcp = h.registry.manager(TransportKind::TcpSocket);
    assert_eq!(tcp.devices(), vec![device]);
    assert!(h.registry.manager(TransportKind::Serial).devices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_print_label_uses_active_manager() {
    let h = harness();
    let tcp = h.registry.select(TransportKind::TcpSocket);
    tcp.connect(&Device::tcp("Dock", "10.0.0.5", 9100)).await.unwrap();

    let service = PrintService::new(Arc::clone(&h.registry));
    service.print_label("A\nBB", LabelLanguage::Zpl).await.unwrap();
    service.print_test_label(LabelLanguage::Cpcl).await.unwrap();

    let writes = h.tcp.writes();
    assert_eq!(writes[0], command::encode_label("A\nBB", LabelLanguage::Zpl));
    assert_eq!(writes[1], command::test_label(LabelLanguage::Cpcl));
    assert!(h.serial.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_print_without_connection_fails() {
    let h = harness();
    let service = PrintService::new(Arc::clone(&h.registry));

    let result = service.print_universal_test().await;
    assert!(matches!(result, Err(PrintError::Printer(_))));
    assert_eq!(
        h.registry.active().last_error().as_deref(),
        Some("Printer not connected")
    );
}

#[tokio::test(start_paused = true)]
async fn test_checked_print_refuses_on_paper_out() {
    let h = harness();
    let usb = h.registry.select(TransportKind::UsbBulk);
    usb.connect(&usb_printer()).await.unwrap();
    h.usb.reply_to(TSC_STATUS.bytes, &[0x04]);

    let service = PrintService::new(Arc::clone(&h.registry));
    let result = service.print_simple_test("TEST").await;
    assert_eq!(result, Err(PrintError::Refused(PrintRefusal::PaperOut)));
    assert_eq!(
        result.unwrap_err().to_string(),
        "Paper is out! Please load paper."
    );

    // only the status query went out
    assert_eq!(h.usb.writes(), vec![TSC_STATUS.bytes.to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_checked_print_on_ready_printer() {
    let h = harness();
    let usb = h.registry.select(TransportKind::UsbBulk);
    usb.connect(&usb_printer()).await.unwrap();
    h.usb.reply_to(TSC_STATUS.bytes, &[0x00]);

    let service = PrintService::new(Arc::clone(&h.registry));
    service.print_simple_test("TEST").await.unwrap();

    let writes = h.usb.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1], tspl::simple_test("TEST"));
}

#[tokio::test(start_paused = true)]
async fn test_checked_print_skips_probe_on_write_only_link() {
    let h = harness();
    h.serial.set_readable(false);
    let serial = h.registry.select(TransportKind::Serial);
    serial
        .connect(&Device::new("Inner Printer (Simulated)", "simulated", TransportKind::Serial))
        .await
        .unwrap();

    let service = PrintService::new(Arc::clone(&h.registry));
    service.print_checked(b"hello").await.unwrap();
    assert_eq!(h.serial.writes(), vec![b"hello".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_test_page_names_connected_device() {
    let h = harness();
    let usb = h.registry.select(TransportKind::UsbBulk);
    usb.connect(&usb_printer()).await.unwrap();

    let service = PrintService::new(Arc::clone(&h.registry));
    service.print_test_page().await.unwrap();

    let page = String::from_utf8_lossy(&h.usb.writes()[0]).into_owned();
    assert!(page.contains("USB Printer (0fe6:811e)"));
    assert!(page.contains("/dev/bus/usb/001/004"));
}
