/// A vendor command that may elicit a status reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusQuery {
    pub name: &'static str,
    pub bytes: &'static [u8],
}

impl StatusQuery {
    const fn new(name: &'static str, bytes: &'static [u8]) -> Self {
        Self { name, bytes }
    }
}

/// TSC real-time status (`ESC ! ?`)
pub const TSC_STATUS: StatusQuery = StatusQuery::new("ESC!?", &[0x1B, 0x21, 0x3F]);
pub const TSC_STATUS_ALT: StatusQuery = StatusQuery::new("ESC!S", &[0x1B, 0x21, 0x53]);
/// ESC/POS real-time printer status
pub const DLE_EOT: StatusQuery = StatusQuery::new("DLE_EOT", &[0x10, 0x04, 0x01]);
/// ESC/POS paper sensor status
pub const GS_R_PAPER: StatusQuery = StatusQuery::new("GS_r_1", &[0x1D, 0x72, 0x01]);
pub const TEXT_STATUS: StatusQuery = StatusQuery::new("STATUS", b"STATUS\r\n");
pub const TSPL_STATUS: StatusQuery = StatusQuery::new("~!S", b"~!S\r\n");
pub const TSPL_CONFIG: StatusQuery = StatusQuery::new("~!C", b"~!C\r\n");
pub const QUERY_STATUS: StatusQuery = StatusQuery::new("?S", b"?S\r\n");
pub const TSC_RESET_STATUS: StatusQuery = StatusQuery::new("ESC!R", &[0x1B, 0x21, 0x52]);
/// ESC/POS automatic status back
pub const GS_A_AUTO: StatusQuery = StatusQuery::new("GS_a_1", &[0x1D, 0x61, 0x01]);

/// Probe candidates, in the order they are tried
pub const STATUS_QUERIES: [StatusQuery; 10] = [
    TSC_STATUS,
    TSC_STATUS_ALT,
    DLE_EOT,
    GS_R_PAPER,
    TEXT_STATUS,
    TSPL_STATUS,
    TSPL_CONFIG,
    QUERY_STATUS,
    TSC_RESET_STATUS,
    GS_A_AUTO,
];

/// TSPL model/firmware information
pub const TSPL_INFO: StatusQuery = StatusQuery::new("~!I", b"~!I\r\n");
pub const TSPL_VERSION: StatusQuery = StatusQuery::new("~!F", b"~!F\r\n");
pub const ZPL_HOST_STATUS: StatusQuery = StatusQuery::new("~HS", b"~HS");
pub const ZPL_HOST_IDENT: StatusQuery = StatusQuery::new("~HI", b"~HI");
pub const EPL_STATUS: StatusQuery = StatusQuery::new("EPL S", b"\r\nS\r\n");
/// ESC/POS roll paper sensor
pub const DLE_EOT_PAPER: StatusQuery = StatusQuery::new("DLE_EOT_4", &[0x10, 0x04, 0x04]);
