/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Resource-name helpers for orchestrator object names.

/// Maps an arbitrary id onto the orchestrator's DNS-label alphabet.
///
/// Lower-cases, replaces anything outside `[a-z0-9]` with `-`, and swaps a
/// leading or trailing `-` for `1` so the result starts and ends alphanumeric.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();

    if sanitized.starts_with('-') {
        sanitized.replace_range(0..1, "1");
    }
    if sanitized.ends_with('-') {
        let last = sanitized.len() - 1;
        sanitized.replace_range(last.., "1");
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::sanitize_name;

    #[test]
    fn replaces_invalid_characters() {
        assert_eq!(sanitize_name("Pooled.Small_Queue"), "pooled-small-queue");
    }

    #[test]
    fn fixes_leading_and_trailing_dashes() {
        assert_eq!(sanitize_name("/orders/"), "1orders1");
        assert_eq!(sanitize_name("-"), "1");
    }

    #[test]
    fn leaves_valid_names_untouched() {
        assert_eq!(sanitize_name("pooled-small"), "pooled-small");
    }
}
