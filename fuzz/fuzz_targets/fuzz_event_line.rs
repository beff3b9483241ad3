// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;

use ebus::MsgDefs;
use std::sync::Arc;
use std::sync::OnceLock;

static MSGDEFS: OnceLock<MsgDefs> = OnceLock::new();

fn msgdefs() -> &'static MsgDefs {
    MSGDEFS.get_or_init(|| {
        let mut msgdefs = MsgDefs::new();
        msgdefs.add(Arc::new(
            ebus::decode_msgdef("r,bai,Status01,temp1,s,D2C,,°C,,temp2,s,D2C,,°C,").unwrap(),
        ));
        msgdefs
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = ebus::decode_line(msgdefs(), line);
    }
});
