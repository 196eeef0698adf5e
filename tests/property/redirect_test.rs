// tests/property/redirect_test.rs

use proptest::prelude::*;
use spinel_client::SpinelClientError;

proptest! {
    /// MOVED replies parse back into their structured form verbatim.
    #[test]
    fn moved_replies_round_trip(slot in 0u16..16384, port in 1024u16..65535) {
        let addr = format!("10.0.0.1:{port}");
        let parsed = SpinelClientError::from_server_reply(&format!("MOVED {slot} {addr}"));
        prop_assert_eq!(parsed, SpinelClientError::Moved { slot, addr });
    }

    /// ASK replies parse back into their structured form verbatim.
    #[test]
    fn ask_replies_round_trip(slot in 0u16..16384, port in 1024u16..65535) {
        let addr = format!("10.0.0.1:{port}");
        let parsed = SpinelClientError::from_server_reply(&format!("ASK {slot} {addr}"));
        prop_assert_eq!(parsed, SpinelClientError::Ask { slot, addr });
    }

    /// Anything that is not a recognized prefix surfaces as a server error
    /// carrying the original text.
    #[test]
    fn unknown_errors_surface_verbatim(text in "ERR [a-z ]{1,30}") {
        let parsed = SpinelClientError::from_server_reply(&text);
        prop_assert_eq!(parsed, SpinelClientError::ServerError(text));
    }
}
