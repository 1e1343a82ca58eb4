// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Key compilation: turning a key template and a declared parameter list into
//! a function from call arguments to cache keys.
//!
//! Templates use the familiar str-format mini-language: literal text,
//! positional fields (`{}`), named fields (`{name}`), an optional format spec
//! (`{name:04}`), and `{{` / `}}` escapes. Compilation happens once, when a
//! wrapper is built; every template problem is a
//! [`Configuration`](crate::Error::Configuration) error at that point, never
//! at call time.
//!
//! Rust cannot introspect a function's parameter names, so the decoration
//! builder declares them explicitly (see
//! [`WrapperBuilder::params`](crate::builder::WrapperBuilder::params)). The
//! declared list must match the wrapped function's argument tuple in length,
//! which is also what rules out open-ended argument sets.

use std::fmt::Display;
use std::sync::Arc;

use crate::error::{Error, Result};

/// The synthetic field name bound to each element of the id collection in
/// batch mode.
pub const ID_FIELD: &str = "id";

/// Argument tuples a key can be derived from.
///
/// Implemented for tuples of up to four `Display` values (and for `()`).
/// `COUNT` ties the tuple's arity to the declared parameter list; `render`
/// produces the text substituted into key templates.
pub trait KeyArgs: Clone + Send + Sync + 'static {
    /// Number of values in the argument tuple.
    const COUNT: usize;

    /// Renders the value at `index` with its `Display` implementation.
    ///
    /// Returns an empty string for an out-of-range index; compilation
    /// guarantees wrappers never ask for one.
    fn render(&self, index: usize) -> String;
}

impl KeyArgs for () {
    const COUNT: usize = 0;

    fn render(&self, _index: usize) -> String {
        String::new()
    }
}

macro_rules! impl_key_args {
    ($count:literal; $($idx:tt => $name:ident),+) => {
        impl<$($name),+> KeyArgs for ($($name,)+)
        where
            $($name: Display + Clone + Send + Sync + 'static,)+
        {
            const COUNT: usize = $count;

            fn render(&self, index: usize) -> String {
                match index {
                    $($idx => self.$idx.to_string(),)+
                    _ => String::new(),
                }
            }
        }
    };
}

impl_key_args!(1; 0 => A0);
impl_key_args!(2; 0 => A0, 1 => A1);
impl_key_args!(3; 0 => A0, 1 => A1, 2 => A2);
impl_key_args!(4; 0 => A0, 1 => A1, 2 => A2, 3 => A3);

/// Alignment of a padded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

/// The supported subset of the format-spec mini-language:
/// `[[fill]align][0][width]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Align,
    width: usize,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: Align::Left,
            width: 0,
        }
    }
}

impl FormatSpec {
    fn parse(spec: &str, template: &str) -> Result<Self> {
        let mut parsed = Self::default();
        let chars: Vec<char> = spec.chars().collect();
        let mut pos = 0;

        let align_of = |c: char| match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            _ => None,
        };

        if let (Some(&fill), Some(align)) = (chars.first(), chars.get(1).copied().and_then(align_of)) {
            parsed.fill = fill;
            parsed.align = align;
            pos = 2;
        } else if let Some(align) = chars.first().copied().and_then(align_of) {
            parsed.align = align;
            pos = 1;
        }

        if chars.get(pos) == Some(&'0') {
            // `{:04}` zero-pads from the left, like numeric formatting.
            parsed.fill = '0';
            if pos == 0 {
                parsed.align = Align::Right;
            }
            pos += 1;
        }

        let rest: String = chars[pos..].iter().collect();
        if !rest.is_empty() {
            parsed.width = rest.parse().map_err(|_| {
                Error::configuration(format!(
                    "unsupported format spec {spec:?} in key template {template:?}"
                ))
            })?;
        }

        Ok(parsed)
    }

    fn apply(&self, rendered: &str, out: &mut String) {
        let len = rendered.chars().count();
        if len >= self.width {
            out.push_str(rendered);
            return;
        }
        let pad = self.width - len;
        let (left, right) = match self.align {
            Align::Left => (0, pad),
            Align::Right => (pad, 0),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        out.extend(std::iter::repeat_n(self.fill, left));
        out.push_str(rendered);
        out.extend(std::iter::repeat_n(self.fill, right));
    }
}

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `name` is `None` for a positional `{}` field.
    Field { name: Option<String>, spec: FormatSpec },
}

fn parse_segments(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    literal.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(Error::configuration(format!(
                        "unbalanced '{{' in key template {template:?}"
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let (name, spec) = match field.split_once(':') {
                    Some((name, spec)) => (name, FormatSpec::parse(spec, template)?),
                    None => (field.as_str(), FormatSpec::default()),
                };
                let name = if name.is_empty() { None } else { Some(name.to_owned()) };
                segments.push(Segment::Field { name, spec });
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(Error::configuration(format!(
                        "unbalanced '}}' in key template {template:?}"
                    )));
                }
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// One step of a compiled key plan.
#[derive(Debug, Clone)]
enum Op {
    Literal(String),
    Arg { index: usize, spec: FormatSpec },
}

fn unknown_param(name: &str, valid: &[&str], template: &str) -> Error {
    Error::configuration(format!(
        "unknown param {name:?} in key template {template:?}, valid fields are {valid:?}"
    ))
}

/// Compiles fields against a virtual parameter list, with positional fields
/// consuming parameters left to right, independent of named consumption.
fn compile_ops(template: &str, params: &[&str]) -> Result<Vec<Op>> {
    let segments = parse_segments(template)?;
    let mut ops = Vec::with_capacity(segments.len());
    let mut positional = 0usize;

    for segment in segments {
        match segment {
            Segment::Literal(text) => ops.push(Op::Literal(text)),
            Segment::Field { name, spec } => {
                let index = match &name {
                    Some(name) => params
                        .iter()
                        .position(|param| param == name)
                        .ok_or_else(|| unknown_param(name, params, template))?,
                    None => {
                        let index = positional;
                        positional += 1;
                        if index >= params.len() {
                            return Err(Error::configuration(format!(
                                "key template {template:?} has more positional fields than params {params:?}"
                            )));
                        }
                        index
                    }
                };
                ops.push(Op::Arg { index, spec });
            }
        }
    }
    Ok(ops)
}

/// A compiled single-key function.
///
/// Produced by [`KeyFn::compile`]; renders one key per call from the
/// argument tuple. A template without fields collapses to a constant key
/// that never touches the arguments.
///
/// # Examples
///
/// ```
/// use recall::key::KeyFn;
///
/// let key = KeyFn::compile("user:{user_id}:{lang}", &["user_id", "lang"])?;
/// assert_eq!(key.key(&(7_u64, "en")), "user:7:en");
/// # Ok::<(), recall::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct KeyFn {
    ops: Vec<Op>,
}

impl KeyFn {
    /// Compiles `template` against the declared parameter names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed templates, unknown
    /// field names (the message lists the valid fields), unsupported format
    /// specs, or more positional fields than declared parameters.
    pub fn compile(template: &str, params: &[&str]) -> Result<Self> {
        let mut ops = compile_ops(template, params)?;
        if ops.iter().all(|op| matches!(op, Op::Literal(_))) {
            // Constant template: collapse to a single pre-joined literal.
            let mut joined = String::new();
            for op in &ops {
                if let Op::Literal(text) = op {
                    joined.push_str(text);
                }
            }
            ops = vec![Op::Literal(joined)];
        }
        Ok(Self { ops })
    }

    /// Returns true when the compiled key does not depend on arguments.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, Op::Literal(_)))
    }

    /// Renders the key for `args`.
    pub fn key<A: KeyArgs>(&self, args: &A) -> String {
        let mut out = String::new();
        for op in &self.ops {
            match op {
                Op::Literal(text) => out.push_str(text),
                Op::Arg { index, spec } => spec.apply(&args.render(*index), &mut out),
            }
        }
        out
    }
}

/// A compiled batch key function: one key per id, rest arguments broadcast.
///
/// The first declared parameter of a batch-mode function is the id
/// collection itself; it is excluded from binding and replaced by the
/// synthetic [`ID_FIELD`] (`{id}`), which renders the current element.
/// Positional `{}` fields consume the virtual list `id, rest...` left to
/// right.
///
/// # Examples
///
/// ```
/// use recall::key::BatchKeyFn;
///
/// let key = BatchKeyFn::compile("user:{id}:{lang}", &["lang"])?;
/// assert_eq!(
///     key.keys(&[1_u64, 2], &("en",)),
///     vec!["user:1:en".to_owned(), "user:2:en".to_owned()],
/// );
/// # Ok::<(), recall::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct BatchKeyFn {
    ops: Vec<Op>,
}

impl BatchKeyFn {
    /// Compiles `template` against the declared rest-parameter names (the
    /// parameters after the leading id collection).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`KeyFn::compile`].
    pub fn compile(template: &str, rest_params: &[&str]) -> Result<Self> {
        let mut virtual_params = Vec::with_capacity(rest_params.len() + 1);
        virtual_params.push(ID_FIELD);
        virtual_params.extend_from_slice(rest_params);
        let ops = compile_ops(template, &virtual_params)?;
        Ok(Self { ops })
    }

    /// Renders one key per id, positionally aligned with `ids`.
    pub fn keys<I: Display, A: KeyArgs>(&self, ids: &[I], args: &A) -> Vec<String> {
        ids.iter()
            .map(|id| {
                let mut out = String::new();
                for op in &self.ops {
                    match op {
                        Op::Literal(text) => out.push_str(text),
                        // Virtual index 0 is the id; the rest shift down by one.
                        Op::Arg { index: 0, spec } => spec.apply(&id.to_string(), &mut out),
                        Op::Arg { index, spec } => spec.apply(&args.render(index - 1), &mut out),
                    }
                }
                out
            })
            .collect()
    }
}

/// How a wrapper derives keys: a compiled template or a caller-supplied
/// closure (the identity escape hatch).
pub(crate) enum KeySource<A> {
    Template(KeyFn),
    Custom(Arc<dyn Fn(&A) -> String + Send + Sync>),
}

impl<A: KeyArgs> KeySource<A> {
    pub(crate) fn key(&self, args: &A) -> String {
        match self {
            Self::Template(keyfn) => keyfn.key(args),
            Self::Custom(keyfn) => keyfn(args),
        }
    }
}

impl<A> Clone for KeySource<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Template(keyfn) => Self::Template(keyfn.clone()),
            Self::Custom(keyfn) => Self::Custom(Arc::clone(keyfn)),
        }
    }
}

impl<A> std::fmt::Debug for KeySource<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Template(keyfn) => f.debug_tuple("Template").field(keyfn).finish(),
            Self::Custom(_) => f.debug_struct("Custom").finish_non_exhaustive(),
        }
    }
}

/// Batch-mode counterpart of [`KeySource`].
pub(crate) enum BatchKeySource<I, A> {
    Template(BatchKeyFn),
    Custom(Arc<dyn Fn(&[I], &A) -> Vec<String> + Send + Sync>),
}

impl<I: Display, A: KeyArgs> BatchKeySource<I, A> {
    pub(crate) fn keys(&self, ids: &[I], args: &A) -> Vec<String> {
        match self {
            Self::Template(keyfn) => keyfn.keys(ids, args),
            Self::Custom(keyfn) => keyfn(ids, args),
        }
    }
}

impl<I, A> Clone for BatchKeySource<I, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Template(keyfn) => Self::Template(keyfn.clone()),
            Self::Custom(keyfn) => Self::Custom(Arc::clone(keyfn)),
        }
    }
}

impl<I, A> std::fmt::Debug for BatchKeySource<I, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Template(keyfn) => f.debug_tuple("Template").field(keyfn).finish(),
            Self::Custom(_) => f.debug_struct("Custom").finish_non_exhaustive(),
        }
    }
}

/// Checks that the declared parameter list matches the argument tuple arity.
pub(crate) fn check_arity<A: KeyArgs>(params: &[&str]) -> Result<()> {
    if params.len() == A::COUNT {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "declared {} parameter name(s) {params:?} but the argument tuple has {} value(s)",
            params.len(),
            A::COUNT,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_fields_bind_by_name() {
        let key = KeyFn::compile("{foo}-{boo}", &["foo", "boo"]).unwrap();
        assert_eq!(key.key(&(10, 20)), "10-20");

        let key = KeyFn::compile("{boo}-{foo}", &["foo", "boo"]).unwrap();
        assert_eq!(key.key(&(10, 20)), "20-10");
    }

    #[test]
    fn positional_fields_bind_left_to_right() {
        let key = KeyFn::compile("{}:{}", &["foo", "boo"]).unwrap();
        assert_eq!(key.key(&(10, 20)), "10:20");
    }

    #[test]
    fn positional_and_named_consumption_are_independent() {
        // The positional field takes the first param even though a named
        // field already referenced it.
        let key = KeyFn::compile("{boo}-{}", &["foo", "boo"]).unwrap();
        assert_eq!(key.key(&(10, 20)), "20-10");
    }

    #[test]
    fn constant_template_ignores_args() {
        let key = KeyFn::compile("all-users", &[]).unwrap();
        assert!(key.is_constant());
        assert_eq!(key.key(&()), "all-users");
    }

    #[test]
    fn braces_escape() {
        let key = KeyFn::compile("{{literal}}:{foo}", &["foo"]).unwrap();
        assert_eq!(key.key(&(1,)), "{literal}:1");
    }

    #[test]
    fn unknown_field_lists_valid_fields() {
        let error = KeyFn::compile("{nope}", &["foo", "boo"]).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("nope"), "{message}");
        assert!(message.contains("foo"), "{message}");
        assert!(message.contains("boo"), "{message}");
    }

    #[test]
    fn too_many_positional_fields_fail_at_compile_time() {
        assert!(KeyFn::compile("{}:{}", &["foo"]).is_err());
    }

    #[test]
    fn unbalanced_braces_fail() {
        assert!(KeyFn::compile("user:{foo", &["foo"]).is_err());
        assert!(KeyFn::compile("user:foo}", &["foo"]).is_err());
    }

    #[test]
    fn format_specs_pad() {
        let key = KeyFn::compile("{foo:04}", &["foo"]).unwrap();
        assert_eq!(key.key(&(7,)), "0007");

        let key = KeyFn::compile("{foo:>4}", &["foo"]).unwrap();
        assert_eq!(key.key(&("ab",)), "  ab");

        let key = KeyFn::compile("{foo:*^4}", &["foo"]).unwrap();
        assert_eq!(key.key(&("ab",)), "*ab*");
    }

    #[test]
    fn unsupported_format_spec_fails() {
        assert!(KeyFn::compile("{foo:.3}", &["foo"]).is_err());
    }

    #[test]
    fn batch_substitutes_id_and_broadcasts_rest() {
        let key = BatchKeyFn::compile("user:{id}:{lang}", &["lang"]).unwrap();
        assert_eq!(key.keys(&[1, 2, 3], &("en",)), vec!["user:1:en", "user:2:en", "user:3:en"]);
    }

    #[test]
    fn batch_positional_consumes_id_first() {
        let key = BatchKeyFn::compile("u:{}:{}", &["lang"]).unwrap();
        assert_eq!(key.keys(&[5], &("de",)), vec!["u:5:de"]);
    }

    #[test]
    fn batch_unknown_field_mentions_id() {
        let error = BatchKeyFn::compile("{ids}", &["lang"]).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("id"), "{message}");
        assert!(message.contains("lang"), "{message}");
    }

    #[test]
    fn arity_check_matches_tuple_count() {
        assert!(check_arity::<(u64,)>(&["user_id"]).is_ok());
        assert!(check_arity::<(u64, String)>(&["user_id"]).is_err());
        assert!(check_arity::<()>(&[]).is_ok());
    }
}
