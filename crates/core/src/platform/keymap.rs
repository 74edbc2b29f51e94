use crate::logger;

/// Windows virtual-key code for a logical key name. Used by the message
/// and simulated backends. Unknown names warn and yield `None`; the key
/// event then becomes a no-op.
pub fn virtual_key(key: &str) -> Option<u16> {
    let code = match key {
        "left" => 0x25,
        "up" => 0x26,
        "right" => 0x27,
        "down" => 0x28,
        "space" => 0x20,
        "ctrl" => 0x11,
        "alt" => 0x12,
        "shift" => 0x10,
        "enter" => 0x0D,
        "tab" => 0x09,
        "esc" => 0x1B,
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase() as u16,
                (Some(c), None) if c.is_ascii_digit() => c as u16,
                _ => {
                    logger::warn(&format!("unknown key: {}", key));
                    return None;
                }
            }
        }
    };
    Some(code)
}

const QWERTY: &str = "qwertyuiopasdfghjklzxcvbnm";
const QWERTY_SCAN: [u16; 26] = [
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, // qwertyuiop
    0x1E, 0x1F, 0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, // asdfghjkl
    0x2C, 0x2D, 0x2E, 0x2F, 0x30, 0x31, 0x32, // zxcvbnm
];

/// Hardware scan code (QWERTY physical positions) for the driver and
/// direct-injection backends.
pub fn scan_code(key: &str) -> Option<u16> {
    let code = match key {
        "left" => 0x4B,
        "right" => 0x4D,
        "up" => 0x48,
        "down" => 0x50,
        "space" => 0x39,
        "ctrl" => 0x1D,
        "alt" => 0x38,
        "shift" => 0x2A,
        "enter" => 0x1C,
        "tab" => 0x0F,
        "esc" => 0x01,
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    let idx = QWERTY.find(c.to_ascii_lowercase())?;
                    QWERTY_SCAN[idx]
                }
                (Some('0'), None) => 0x0B,
                (Some(c), None) if c.is_ascii_digit() => 0x02 + (c as u16 - '1' as u16),
                _ => {
                    logger::warn(&format!("unknown key for scan-code backend: {}", key));
                    return None;
                }
            }
        }
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_keys_for_named_letters_and_digits() {
        assert_eq!(virtual_key("left"), Some(0x25));
        assert_eq!(virtual_key("space"), Some(0x20));
        assert_eq!(virtual_key("a"), Some(0x41));
        assert_eq!(virtual_key("Z"), Some(0x5A));
        assert_eq!(virtual_key("7"), Some(0x37));
        assert_eq!(virtual_key("f12"), None);
        assert_eq!(virtual_key(""), None);
    }

    #[test]
    fn scan_codes_follow_qwerty_rows() {
        assert_eq!(scan_code("q"), Some(0x10));
        assert_eq!(scan_code("p"), Some(0x19));
        assert_eq!(scan_code("a"), Some(0x1E));
        assert_eq!(scan_code("l"), Some(0x26));
        assert_eq!(scan_code("z"), Some(0x2C));
        assert_eq!(scan_code("m"), Some(0x32));
        assert_eq!(scan_code("left"), Some(0x4B));
        assert_eq!(scan_code("1"), Some(0x02));
        assert_eq!(scan_code("9"), Some(0x0A));
        assert_eq!(scan_code("0"), Some(0x0B));
        assert_eq!(scan_code("home"), None);
    }
}
