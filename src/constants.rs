//! Protocol constants and configuration values

/// Default Asterisk AMI port for TCP connections
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Substring the server banner must contain to be accepted as an AMI endpoint
pub const AMI_BANNER_TOKEN: &str = "Asterisk Call Manager";

/// Protocol line terminator (headers are CRLF-delimited)
pub const LINE_TERMINATOR: &str = "\r\n";

/// Maximum length of a single header line (bytes) - validates against a
/// misbehaving or non-AMI peer flooding the reader
pub const MAX_LINE_SIZE: usize = 16 * 1024;

/// Header carrying the action name on outgoing requests
pub const HEADER_ACTION: &str = "Action";
/// Header correlating an action with its response
pub const HEADER_ACTION_ID: &str = "Actionid";
/// Header marking a message as an action response; value is the status
pub const HEADER_RESPONSE: &str = "Response";
/// Header marking a message as an unsolicited event; value is the event name
pub const HEADER_EVENT: &str = "Event";
/// Header listing the comma-separated privilege scopes of an event
pub const HEADER_PRIVILEGE: &str = "Privilege";
/// Header carrying the server-side error text on an `Error` response
pub const HEADER_MESSAGE: &str = "Message";

/// Response status value the server uses to report a failed action
pub const STATUS_ERROR: &str = "Error";

/// Maximum number of queued events before the publisher blocks
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 100;

/// Capacity of the logic-error and network-error queues. Sized to hold the
/// first failure; the reader blocks rather than dropping subsequent ones.
pub const ERROR_QUEUE_SIZE: usize = 1;
