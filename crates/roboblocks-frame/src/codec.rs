/// Marks the start of a frame on the wire.
pub const START_MARKER: char = '*';

/// Terminates a frame on the wire.
pub const TERMINATOR: char = '\n';

/// Separates fields within a frame.
pub const FIELD_SEPARATOR: char = ',';

const ESCAPE: char = '\\';

/// One logical message exchanged with the companion module.
///
/// A frame is an ordered list of string fields. Request frames carry the
/// opcode in the first field; response frames carry the outcome marker there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    fields: Vec<String>,
}

impl Frame {
    /// Create a frame from its fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// The first field (opcode or outcome marker).
    pub fn head(&self) -> Option<&str> {
        self.field(0)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Encode into a single wire line.
    pub fn encode(&self) -> String {
        encode_frame(&self.fields)
    }

    /// Decode a raw received line. See [`decode_frame`].
    pub fn decode(raw: &str) -> Option<Self> {
        decode_frame(raw).map(|fields| Self { fields })
    }
}

impl std::ops::Index<usize> for Frame {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.fields[index]
    }
}

/// Escape one field so it cannot be confused with framing characters.
///
/// ```text
/// \  ->  \\
/// *  ->  \s
/// LF ->  \n
/// ,  ->  \c
/// ```
pub fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            ESCAPE => out.push_str("\\\\"),
            START_MARKER => out.push_str("\\s"),
            TERMINATOR => out.push_str("\\n"),
            FIELD_SEPARATOR => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_field`].
///
/// A lone trailing backslash and unknown escape sequences are dropped.
pub fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != ESCAPE {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some(ESCAPE) => out.push(ESCAPE),
            Some('s') => out.push(START_MARKER),
            Some('n') => out.push(TERMINATOR),
            Some('c') => out.push(FIELD_SEPARATOR),
            Some(_) => {}
            None => break,
        }
    }
    out
}

/// Encode fields into the wire format.
///
/// Wire format:
/// ```text
/// *field0,field1,...,fieldN\n
/// ```
/// Each field is escaped independently with [`escape_field`].
pub fn encode_frame<S: AsRef<str>>(fields: &[S]) -> String {
    let body: Vec<String> = fields.iter().map(|f| escape_field(f.as_ref())).collect();
    let mut line = String::with_capacity(body.iter().map(|f| f.len() + 1).sum::<usize>() + 2);
    line.push(START_MARKER);
    line.push_str(&body.join(","));
    line.push(TERMINATOR);
    line
}

/// Decode a raw received line into its fields.
///
/// The right-most start marker begins the frame; anything before it (debug
/// output from the module, line noise) is ignored. A single trailing
/// terminator is stripped. Returns `None` when the line holds no marker.
pub fn decode_frame(raw: &str) -> Option<Vec<String>> {
    let start = raw.rfind(START_MARKER)?;
    let body = &raw[start + START_MARKER.len_utf8()..];
    let body = body.strip_suffix(TERMINATOR).unwrap_or(body);
    Some(body.split(FIELD_SEPARATOR).map(unescape_field).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let fields = ["ws_send", "42", "message_type\tlogin\nroom_name\ta,b*c\\d"];
        let line = encode_frame(&fields);

        assert!(line.starts_with('*'));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(line.matches('*').count(), 1);

        let decoded = decode_frame(&line).unwrap();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn test_escape_table() {
        assert_eq!(escape_field("a\\b"), "a\\\\b");
        assert_eq!(escape_field("a*b"), "a\\sb");
        assert_eq!(escape_field("a\nb"), "a\\nb");
        assert_eq!(escape_field("a,b"), "a\\cb");
        assert_eq!(escape_field("plain\ttab"), "plain\ttab");
    }

    #[test]
    fn test_encode_wire_shape() {
        assert_eq!(
            encode_frame(&["wifi_connect", "my,net", "p*ss"]),
            "*wifi_connect,my\\cnet,p\\sss\n"
        );
    }

    #[test]
    fn test_decode_picks_rightmost_marker() {
        let decoded = decode_frame("boot*noise ** more*ok,1\n").unwrap();
        assert_eq!(decoded, vec!["ok", "1"]);
    }

    #[test]
    fn test_decode_garbage_prefix_with_real_frame() {
        let real = encode_frame(&["ok", "3", "x*y,z"]);
        let raw = format!("rst:0x1 (POWERON)*garbage*{}", &real[1..]);
        assert_eq!(decode_frame(&raw).unwrap(), vec!["ok", "3", "x*y,z"]);
    }

    #[test]
    fn test_decode_without_marker_is_ignored() {
        assert!(decode_frame("ok,1\n").is_none());
        assert!(decode_frame("").is_none());
    }

    #[test]
    fn test_decode_without_terminator() {
        assert_eq!(decode_frame("*not_received").unwrap(), vec!["not_received"]);
    }

    #[test]
    fn test_decode_strips_only_one_terminator() {
        assert_eq!(decode_frame("*ok\n\n").unwrap(), vec!["ok\n"]);
    }

    #[test]
    fn test_trailing_lone_backslash_is_dropped() {
        assert_eq!(unescape_field("abc\\"), "abc");
        assert_eq!(decode_frame("*ok,abc\\\n").unwrap(), vec!["ok", "abc"]);
    }

    #[test]
    fn test_unknown_escape_is_dropped() {
        assert_eq!(unescape_field("a\\xb"), "ab");
    }

    #[test]
    fn test_empty_fields_survive() {
        let line = encode_frame(&["ok", "", ""]);
        assert_eq!(line, "*ok,,\n");
        assert_eq!(decode_frame(&line).unwrap(), vec!["ok", "", ""]);
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::decode("*ok,2,payload\n").unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.head(), Some("ok"));
        assert_eq!(frame.field(2), Some("payload"));
        assert_eq!(frame.field(3), None);
        assert_eq!(frame.encode(), "*ok,2,payload\n");
    }
}
