/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

pub(crate) mod messages;
pub(crate) mod xml;

/// Remove one pair of surrounding double quotes, if present.
///
/// ETag values arrive quoted on the wire but are referenced unquoted in the
/// complete-multipart-upload body.
pub(crate) fn strip_quotes(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::strip_quotes;

    #[test]
    fn test_strip_quotes() {
        assert_eq!("abc", strip_quotes("\"abc\""));
        assert_eq!("abc", strip_quotes("abc"));
        // only a full pair is stripped
        assert_eq!("\"abc", strip_quotes("\"abc"));
        assert_eq!("", strip_quotes("\"\""));
    }
}
