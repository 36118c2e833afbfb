//! Display masks for Brazilian phone numbers and CPF documents.
//!
//! Both masks only look at the digits of their input, so applying a mask to
//! already-masked text gives the same result.

const MAX_DIGITS: usize = 11;

pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn truncated_digits(value: &str) -> String {
    let mut digits = digits_only(value);
    digits.truncate(MAX_DIGITS);
    digits
}

/// `(DD) NNNN-NNNN` for landlines, `(DD) NNNNN-NNNN` for 11-digit mobiles.
/// Partial input is masked progressively.
pub fn format_phone(value: &str) -> String {
    let digits = truncated_digits(value);
    if digits.len() < 3 {
        return digits;
    }

    let (area, rest) = digits.split_at(2);
    let split = if digits.len() == MAX_DIGITS { 5 } else { 4 };

    if rest.len() > split {
        let (first, last) = rest.split_at(split);
        format!("({area}) {first}-{last}")
    } else {
        format!("({area}) {rest}")
    }
}

/// `NNN.NNN.NNN-NN`, masked progressively.
pub fn format_cpf(value: &str) -> String {
    let digits = truncated_digits(value);
    match digits.len() {
        0..=3 => digits,
        4..=6 => format!("{}.{}", &digits[..3], &digits[3..]),
        7..=9 => format!("{}.{}.{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_landline_and_mobile() {
        assert_eq!(format_phone("1123456789"), "(11) 2345-6789");
        assert_eq!(format_phone("11912345678"), "(11) 91234-5678");
    }

    #[test]
    fn phone_partial_input() {
        assert_eq!(format_phone(""), "");
        assert_eq!(format_phone("1"), "1");
        assert_eq!(format_phone("11"), "11");
        assert_eq!(format_phone("112"), "(11) 2");
        assert_eq!(format_phone("112345"), "(11) 2345");
        assert_eq!(format_phone("1123456"), "(11) 2345-6");
    }

    #[test]
    fn phone_truncates_extra_digits() {
        assert_eq!(format_phone("119123456789999"), "(11) 91234-5678");
        assert_eq!(format_phone("+55 (11) 9.1234-5678"), "(55) 11912-3456");
    }

    #[test]
    fn cpf_progressive() {
        assert_eq!(format_cpf("123"), "123");
        assert_eq!(format_cpf("1234"), "123.4");
        assert_eq!(format_cpf("1234567"), "123.456.7");
        assert_eq!(format_cpf("1234567890"), "123.456.789-0");
        assert_eq!(format_cpf("12345678901"), "123.456.789-01");
        assert_eq!(format_cpf("123456789012345"), "123.456.789-01");
    }

    #[test]
    fn masks_are_idempotent() {
        for input in [
            "",
            "9",
            "119",
            "11234567",
            "1123456789",
            "11912345678",
            "abc11 9 1234 5678 99",
        ] {
            let once = format_phone(input);
            assert_eq!(format_phone(&once), once, "phone {input:?}");

            let once = format_cpf(input);
            assert_eq!(format_cpf(&once), once, "cpf {input:?}");
        }
    }

    #[test]
    fn digits_only_strips_everything_else() {
        assert_eq!(digits_only("123.456.789-01"), "12345678901");
        assert_eq!(digits_only("(11) 2345-6789"), "1123456789");
    }
}
