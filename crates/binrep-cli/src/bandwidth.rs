/// Parse a human byte size such as `1 MB`, `1024 KB`, `512KiB` or `65536`.
///
/// Decimal units (`KB`, `MB`, ...) are powers of 1000, binary units (`KiB`,
/// `MiB`, ...) powers of 1024. Units are case-insensitive and a trailing
/// `/s` is accepted.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let text = input.trim();
    let text = text.strip_suffix("/s").unwrap_or(text).trim_end();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    if number.is_empty() {
        return Err(format!("invalid size {input:?}: missing number"));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size {input:?}: bad number {number:?}"))?;

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "ki" | "kib" => 1 << 10,
        "m" | "mb" => 1_000_000,
        "mi" | "mib" => 1 << 20,
        "g" | "gb" => 1_000_000_000,
        "gi" | "gib" => 1 << 30,
        "t" | "tb" => 1_000_000_000_000,
        "ti" | "tib" => 1 << 40,
        other => return Err(format!("invalid size {input:?}: unknown unit {other:?}")),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(format!("invalid size {input:?}: too large"));
    }
    Ok(bytes as u64)
}

/// clap value parser for bandwidth flags. Zero is rejected.
pub fn parse_bandwidth(input: &str) -> Result<u64, String> {
    match parse_size(input)? {
        0 => Err("bandwidth must be greater than zero".into()),
        n => Ok(n),
    }
}
