use crate::error::FormatError;

/// Readable type name for a JVM field descriptor, e.g. `[I` becomes `int[]`.
pub(crate) fn field_type(descriptor: &str) -> Result<String, FormatError> {
    let (name, rest) = parse_type(descriptor, false)?;
    if !rest.is_empty() {
        return Err(invalid(descriptor));
    }
    Ok(name)
}

/// Readable type name for a return descriptor; unlike fields, `V` is allowed.
pub(crate) fn return_type(descriptor: &str) -> Result<String, FormatError> {
    let (name, rest) = parse_type(descriptor, true)?;
    if !rest.is_empty() {
        return Err(invalid(descriptor));
    }
    Ok(name)
}

/// Parameter and return type names of a JVM method descriptor.
pub(crate) fn method_types(descriptor: &str) -> Result<(Vec<String>, String), FormatError> {
    let mut rest = descriptor
        .strip_prefix('(')
        .ok_or_else(|| invalid(descriptor))?;
    let mut parameters = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            let (return_name, tail) = parse_type(after, true)?;
            if !tail.is_empty() {
                return Err(invalid(descriptor));
            }
            return Ok((parameters, return_name));
        }
        let (name, tail) = parse_type(rest, false).map_err(|_| invalid(descriptor))?;
        parameters.push(name);
        rest = tail;
    }
}

fn parse_type(input: &str, allow_void: bool) -> Result<(String, &str), FormatError> {
    let mut dimensions = 0usize;
    let mut rest = input;
    while let Some(stripped) = rest.strip_prefix('[') {
        dimensions += 1;
        rest = stripped;
    }
    let (base, rest) = match rest.as_bytes().first() {
        Some(b'B') => ("byte", &rest[1..]),
        Some(b'C') => ("char", &rest[1..]),
        Some(b'D') => ("double", &rest[1..]),
        Some(b'F') => ("float", &rest[1..]),
        Some(b'I') => ("int", &rest[1..]),
        Some(b'J') => ("long", &rest[1..]),
        Some(b'S') => ("short", &rest[1..]),
        Some(b'Z') => ("boolean", &rest[1..]),
        Some(b'V') if allow_void && dimensions == 0 => ("void", &rest[1..]),
        Some(b'L') => {
            let end = rest.find(';').ok_or_else(|| invalid(input))?;
            if end == 1 {
                return Err(invalid(input));
            }
            (&rest[1..end], &rest[end + 1..])
        }
        _ => return Err(invalid(input)),
    };
    let mut name = String::with_capacity(base.len() + dimensions * 2);
    name.push_str(base);
    for _ in 0..dimensions {
        name.push_str("[]");
    }
    Ok((name, rest))
}

fn invalid(descriptor: &str) -> FormatError {
    FormatError::InvalidDescriptor(descriptor.to_string())
}
