#![no_main]

use ferrous_whitebox::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must encode back to an equal message
    if let Ok(message) = serde_json::from_slice::<Message>(data) {
        let encoded = serde_json::to_vec(&message).unwrap();
        let decoded: Message = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, message);
    }
});
