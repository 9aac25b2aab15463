#![no_main]

use libfuzzer_sys::fuzz_target;
use secure_user_api::auth::CredentialRecord;

// Parsing arbitrary stored strings must never panic, and anything that
// parses must serialize back to a string that parses to the same record.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = input.parse::<CredentialRecord>() {
        let reparsed = record
            .to_string()
            .parse::<CredentialRecord>()
            .expect("serialized record must parse");
        assert_eq!(record, reparsed);
    }
});
