use super::{Val, MAX_STRING};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub const SIGNIFICANT_DIGITS: usize = 14;

/// Shortest text for a float with up to 14 significant digits.
/// Integral values print without a decimal point.
pub fn float(n: f64) -> String {
    if n.is_nan() {
        return "NAN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -5 || exp >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}E{}{:02}", trim_zeros(mantissa), sign, exp.abs());
    }
    let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exp).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, n)).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Numeric text for STR$: `width` is the minimum number of characters before
/// the decimal point, padded on the left with `pad`; `decimals` fixes the
/// number of places, negative values select exponential notation.
pub fn number(val: &Val, width: Option<usize>, decimals: Option<i32>, pad: u8) -> Result<String> {
    let places = decimals.map_or(0, |places| places.unsigned_abs() as usize);
    if width.unwrap_or(0) > MAX_STRING || places > MAX_STRING {
        return Err(error!(StringTooLong));
    }
    let text = match (val, decimals) {
        (Val::String(_), _) => return Err(error!(TypeMismatch)),
        (Val::Integer(n), None) => n.to_string(),
        (Val::Float(n), None) => float(*n),
        (val, Some(places)) => {
            let n = match val {
                Val::Integer(n) => *n as f64,
                Val::Float(n) => *n,
                Val::String(_) => 0.0,
            };
            if places < 0 {
                let s = format!("{:.*e}", places.unsigned_abs() as usize, n);
                match s.split_once('e') {
                    Some((m, e)) => {
                        let exp = e.parse::<i32>().unwrap_or(0);
                        let sign = if exp < 0 { '-' } else { '+' };
                        format!("{}E{}{:02}", m, sign, exp.abs())
                    }
                    None => s,
                }
            } else {
                format!("{:.*}", places as usize, n)
            }
        }
    };
    let width = match width {
        Some(w) => w,
        None => return Ok(text),
    };
    let integral = text.find(|c| c == '.' || c == 'E').unwrap_or(text.len());
    if integral >= width {
        return Ok(text);
    }
    let mut out = String::new();
    for _ in integral..width {
        out.push(pad as char);
    }
    out.push_str(&text);
    if out.len() > MAX_STRING {
        return Err(error!(StringTooLong));
    }
    Ok(out)
}

/// HEX$, OCT$ and BIN$. Negative numbers show their two's complement.
pub fn radix(n: i64, radix: u32, digits: Option<usize>) -> Result<String> {
    if digits.unwrap_or(0) > MAX_STRING {
        return Err(error!(StringTooLong));
    }
    let mut u = n as u64;
    let mut s = vec![];
    loop {
        let d = (u % radix as u64) as u32;
        s.push(std::char::from_digit(d, radix).unwrap_or('0').to_ascii_uppercase());
        u /= radix as u64;
        if u == 0 {
            break;
        }
    }
    if let Some(digits) = digits {
        while s.len() < digits {
            s.push('0');
        }
    }
    Ok(s.iter().rev().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float() {
        assert_eq!(float(7.5), "7.5");
        assert_eq!(float(3.0), "3");
        assert_eq!(float(-0.25), "-0.25");
        assert_eq!(float(0.1 + 0.2), "0.3");
        assert_eq!(float(1.0 / 3.0), "0.33333333333333");
        assert_eq!(float(1e20), "1E+20");
        assert_eq!(float(1.5e-7), "1.5E-07");
        assert_eq!(float(123456.0), "123456");
    }

    #[test]
    fn test_number_padding() {
        assert_eq!(number(&Val::Integer(7), Some(4), None, b' ').unwrap(), "   7");
        assert_eq!(number(&Val::Float(3.14159), Some(3), Some(2), b'0').unwrap(), "003.14");
        assert_eq!(number(&Val::Float(1234.5), None, Some(-2), b' ').unwrap(), "1.23E+03");
        assert!(number(&Val::Float(1.0), None, Some(i32::MAX), b' ').is_err());
        assert!(number(&Val::Float(1.0), None, Some(-1_000_000), b' ').is_err());
        assert!(number(&Val::Integer(1), Some(1 << 40), None, b' ').is_err());
    }

    #[test]
    fn test_radix() {
        assert_eq!(radix(255, 16, None).unwrap(), "FF");
        assert_eq!(radix(5, 2, Some(8)).unwrap(), "00000101");
        assert_eq!(radix(8, 8, None).unwrap(), "10");
        assert_eq!(radix(-1, 16, None).unwrap(), "FFFFFFFFFFFFFFFF");
        assert_eq!(radix(1, 16, Some(MAX_STRING)).unwrap().len(), MAX_STRING);
        assert!(radix(1, 16, Some(MAX_STRING + 1)).is_err());
    }
}
