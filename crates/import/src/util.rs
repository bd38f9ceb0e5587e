const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decodes an upload as UTF-8, dropping a leading byte-order mark.
pub fn decode_upload(data: &[u8]) -> Result<&str, std::str::Utf8Error> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    std::str::from_utf8(data)
}
