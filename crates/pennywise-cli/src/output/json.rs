use std::io;

use pennywise_core::contracts::envelope::failure_from_error;
use pennywise_core::{CoreError, SuccessEnvelope};
use serde::Serialize;

/// Success output is the full envelope: `ok`, `command`, `version`, `data`.
pub fn render_success_json(success: &SuccessEnvelope) -> io::Result<String> {
    serialize_json_pretty(success)
}

pub fn render_error_json(error: &CoreError) -> io::Result<String> {
    serialize_json_pretty(&failure_from_error(error))
}

fn serialize_json_pretty<T>(value: &T) -> io::Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(value).map_err(io::Error::other)
}
