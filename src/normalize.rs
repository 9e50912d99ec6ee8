// 🧹 Normalization - handles and loosely-typed booleans
// Pure functions, no I/O

/// Canonical form of an entrant identifier
///
/// Trims, strips one leading `@`, lower-cases and drops every whitespace
/// character. Empty or whitespace-only input yields `""`, which callers
/// must treat as a missing handle.
///
/// # Examples:
/// ```
/// use contest_draw::normalize_handle;
/// assert_eq!(normalize_handle("@FooBar "), "foobar");
/// assert_eq!(normalize_handle("  "), "");
/// ```
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);

    trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strings accepted as `true`. Anything else, including garbage, is `false`.
const TRUTHY: [&str; 5] = ["1", "true", "yes", "y", "on"];

/// Values that can be coerced into a strict boolean
///
/// This is a closed allow-list, not a parser: unrecognized strings silently
/// become `false` instead of failing. CSV cells like `"maybe"` or `"2"` are
/// therefore indistinguishable from an explicit `"0"`.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for str {
    fn is_truthy(&self) -> bool {
        let lowered = self.trim().to_lowercase();
        TRUTHY.contains(&lowered.as_str())
    }
}

impl Truthy for &str {
    fn is_truthy(&self) -> bool {
        (**self).is_truthy()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        self.as_str().is_truthy()
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().map_or(false, Truthy::is_truthy)
    }
}

/// Coerce a loosely-typed value into a boolean (missing → false)
pub fn coerce_bool<V: Truthy>(value: V) -> bool {
    value.is_truthy()
}
