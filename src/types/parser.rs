//! Type string parser
//!
//! Turns raw type text (`const std::vector<int>*`, `void (*)(int)`) into an
//! interned [`TypeId`]. The pipeline:
//! 1. Reject empty or wildcard text (unknown)
//! 2. Strip access modifiers, normalise the generics interior
//! 3. Split into blocks; groups and `*`/`&` are atomic
//! 4. Pull out the sign modifier, join multi-word primitives
//! 5. Skip leading storage/qualifier/elaborated keywords
//! 6. Build a function pointer, or classify the base name
//! 7. Apply the suffix blocks, then parenthesised groups
//!
//! Alias resolution runs only when a scope context is attached.

use super::registry::TypeRegistry;
use super::ty::{Modifier, Qualifier, Storage, Type, TypeId, TypeKind, WrapKind};
use crate::language::Language;
use crate::scope::{ScopeId, ScopeTree};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn function_pointer_regex() -> Option<&'static Regex> {
    static FUNCTION_POINTER: OnceLock<Option<Regex>> = OnceLock::new();
    FUNCTION_POINTER
        .get_or_init(|| {
            Regex::new(
                r"(?:(?P<functionptr>[ \t(]+[a-zA-Z0-9_$.<>:]*\*[ \t]*[a-zA-Z0-9_$.<>:]*[ \t)]+)[ \t]*)(?P<args>\(+[a-zA-Z0-9_$.<>,*& \t]*\))",
            )
            .ok()
        })
        .as_ref()
}

/// Parser bound to one language
pub struct TypeParser<'a> {
    language: &'a Language,
    type_parameters: Vec<TypeId>,
    aliases: Option<(&'a ScopeTree, ScopeId)>,
}

impl<'a> TypeParser<'a> {
    pub fn new(language: &'a Language) -> Self {
        Self {
            language,
            type_parameters: Vec::new(),
            aliases: None,
        }
    }

    /// Names matching one of these parameterized types parse to them
    pub fn with_type_parameters(mut self, parameters: Vec<TypeId>) -> Self {
        self.type_parameters = parameters;
        self
    }

    /// Resolve typedef aliases visible from `scope`
    pub fn resolving_aliases(mut self, scopes: &'a ScopeTree, scope: ScopeId) -> Self {
        self.aliases = Some((scopes, scope));
        self
    }

    pub fn parse(&self, registry: &mut TypeRegistry, text: &str) -> TypeId {
        let ty = self.parse_plain(registry, text);
        match self.aliases {
            Some((scopes, scope)) => registry.resolve_typedef(ty, scopes, scope),
            None => ty,
        }
    }

    fn unknown(&self, registry: &mut TypeRegistry) -> TypeId {
        registry.unknown(Some(&self.language.name))
    }

    fn parse_plain(&self, registry: &mut TypeRegistry, text: &str) -> TypeId {
        if text.contains('?') || text.trim().is_empty() {
            debug!("Unparseable type '{}'", text);
            return self.unknown(registry);
        }

        let text = self.strip_access_modifiers(text);
        let text = self.fix_generics(&text);
        let mut blocks = self.separate(&text);

        let mut primitive = blocks.iter().any(|b| self.language.is_primitive(b));
        let modifier = if let Some(pos) = blocks.iter().position(|b| b == "unsigned") {
            if primitive {
                blocks.remove(pos);
            } else {
                blocks[pos] = "int".to_string();
                primitive = true;
            }
            Modifier::Unsigned
        } else if let Some(pos) = blocks.iter().position(|b| b == "signed") {
            if primitive {
                blocks.remove(pos);
            } else {
                blocks[pos] = "int".to_string();
                primitive = true;
            }
            Modifier::Signed
        } else if primitive {
            Modifier::Signed
        } else {
            Modifier::NotApplicable
        };
        let blocks = self.join_primitive(blocks);

        let mut qualifier = Qualifier::NONE;
        let mut storage = Storage::Auto;
        let mut index = 0;
        while let Some(block) = blocks.get(index) {
            if self.language.is_storage_keyword(block) {
                storage = Storage::from_keyword(block).unwrap_or(storage);
            } else if self.language.is_qualifier_keyword(block) {
                if let Some(q) = Qualifier::from_keyword(block) {
                    qualifier = qualifier.merge(q);
                }
            } else if !self.language.is_elaborated_type_specifier(block) {
                break;
            }
            index += 1;
        }

        let Some(base_name) = blocks.get(index) else {
            return self.unknown(registry);
        };
        let rest = &blocks[index + 1..];

        if let Some(ty) = self.parse_function_pointer(registry, base_name, rest, modifier, primitive) {
            return ty;
        }

        let base = self.base_type(registry, base_name, modifier, primitive);
        let base = self.qualify(registry, base, qualifier, storage);

        let mut brackets = Vec::new();
        let ty = self.apply_suffixes(registry, base, rest, &mut brackets);
        brackets
            .iter()
            .fold(ty, |ty, group| self.apply_bracket(registry, ty, group))
    }

    fn qualify(&self, registry: &mut TypeRegistry, ty: TypeId, qualifier: Qualifier, storage: Storage) -> TypeId {
        let ty = if qualifier.is_empty() {
            ty
        } else {
            registry.merge_qualifier(ty, qualifier)
        };
        if storage == Storage::Auto {
            ty
        } else {
            registry.with_storage(ty, storage)
        }
    }

    fn base_type(&self, registry: &mut TypeRegistry, name: &str, modifier: Modifier, primitive: bool) -> TypeId {
        let language = Some(self.language.name.as_str());

        if self.language.is_incomplete_type_name(name) {
            return registry.intern(Type::incomplete(name).with_language(language));
        }
        if name == "UNKNOWN" || self.language.is_unknown_type_name(name) {
            return self.unknown(registry);
        }
        if let Some(param) = self
            .type_parameters
            .iter()
            .find(|p| registry.base_name(**p) == Some(name))
        {
            return *param;
        }

        let (name, generics) = match self.language.generics {
            Some((start, end)) => match (name.find(start), name.rfind(end)) {
                (Some(open), Some(close)) if open < close => {
                    let generics = split_top_level(&name[open + start.len_utf8()..close], ',')
                        .iter()
                        .map(|g| self.parse_plain(registry, g))
                        .collect();
                    (&name[..open], generics)
                }
                _ => (name, Vec::new()),
            },
            None => (name, Vec::new()),
        };

        let kind = if primitive {
            let name = match modifier {
                Modifier::Unsigned => format!("unsigned {}", name),
                _ => name.to_string(),
            };
            TypeKind::Object {
                name,
                generics,
                modifier,
                primitive: true,
            }
        } else {
            TypeKind::Object {
                name: name.to_string(),
                generics,
                modifier: Modifier::NotApplicable,
                primitive: false,
            }
        };
        registry.intern(Type::new(kind).with_language(language))
    }

    /// `R (*name)(A, B)`: the return type is the base plus any suffix blocks
    /// before the first group.
    fn parse_function_pointer(
        &self,
        registry: &mut TypeRegistry,
        base_name: &str,
        rest: &[String],
        modifier: Modifier,
        primitive: bool,
    ) -> Option<TypeId> {
        if !self.language.supports_function_pointers {
            return None;
        }
        let group = rest.iter().position(|b| b.starts_with('('))?;
        let joined = rest[group..].concat();
        let captures = function_pointer_regex()?.captures(joined.trim())?;
        let args = captures.name("args")?.as_str();

        let base = self.base_type(registry, base_name, modifier, primitive);
        let mut ignored = Vec::new();
        let return_type = self.apply_suffixes(registry, base, &rest[..group], &mut ignored);
        let parameters = self.parameter_list(registry, args);

        let language = Some(self.language.name.as_str());
        Some(registry.intern(Type::function_pointer(parameters, return_type).with_language(language)))
    }

    fn parameter_list(&self, registry: &mut TypeRegistry, args: &str) -> Vec<TypeId> {
        let mut inner = args.trim();
        while let Some(stripped) = inner.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            inner = stripped.trim();
        }
        split_top_level(inner, ',')
            .iter()
            .filter(|p| !p.is_empty() && *p != "void")
            .map(|p| self.parse_plain(registry, p))
            .collect()
    }

    fn apply_suffixes(
        &self,
        registry: &mut TypeRegistry,
        mut ty: TypeId,
        parts: &[String],
        brackets: &mut Vec<String>,
    ) -> TypeId {
        for part in parts {
            match part.as_str() {
                "*" => ty = registry.reference(ty, WrapKind::Pointer),
                "&" => ty = registry.reference(ty, WrapKind::Reference),
                p if p.starts_with('[') => ty = registry.reference(ty, WrapKind::Array),
                p if p.starts_with('(') => brackets.push(p.to_string()),
                p if self.language.is_qualifier_keyword(p) => {
                    if let Some(q) = Qualifier::from_keyword(p) {
                        ty = registry.merge_qualifier(ty, q);
                    }
                }
                p if self.language.is_storage_keyword(p) => {
                    if let Some(s) = Storage::from_keyword(p) {
                        ty = registry.with_storage(ty, s);
                    }
                }
                other => debug!("Ignoring type suffix '{}'", other),
            }
        }
        ty
    }

    /// Groups change operator binding, e.g. `int (*)[3]` is a pointer to an array
    fn apply_bracket(&self, registry: &mut TypeRegistry, mut ty: TypeId, group: &str) -> TypeId {
        let inner = group
            .strip_prefix('(')
            .and_then(|g| g.strip_suffix(')'))
            .unwrap_or(group);
        for part in self.separate(inner) {
            if part == "*" {
                ty = registry.reference(ty, WrapKind::Pointer);
            } else if part == "&" {
                ty = registry.dereference(ty);
            } else if part.starts_with('[') {
                ty = registry.reference(ty, WrapKind::Array);
            } else if part.starts_with('(') {
                ty = self.apply_bracket(registry, ty, &part);
            }
        }
        ty
    }

    fn strip_access_modifiers(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|w| !self.language.is_access_modifier(w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Drop elaborated specifiers inside the generics and tighten whitespace
    /// so that the generic part stays one block.
    fn fix_generics(&self, text: &str) -> String {
        let Some((start, end)) = self.language.generics else {
            return text.to_string();
        };
        let (Some(open), Some(close)) = (text.find(start), text.rfind(end)) else {
            return text.to_string();
        };
        if close < open {
            return text.to_string();
        }

        let mut interior = text[open + start.len_utf8()..close].to_string();
        if !self.language.elaborated_type_specifiers.is_empty() {
            let alternatives: Vec<String> = self
                .language
                .elaborated_type_specifiers
                .iter()
                .map(|s| regex::escape(s))
                .collect();
            let pattern = format!(
                r"((?:^|[ \t,{}])[ \t]*)(?:(?:{})[ \t]+)",
                regex::escape(&start.to_string()),
                alternatives.join("|")
            );
            if let Ok(re) = Regex::new(&pattern) {
                interior = re.replace_all(&interior, "$1").into_owned();
            }
        }

        let mut normalized = String::new();
        let mut pending_space = false;
        let tight = |c: char| c == ',' || c == start || c == end;
        for c in interior.chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space && normalized.chars().last().is_some_and(|last| !tight(last)) && !tight(c) {
                normalized.push(' ');
            }
            pending_space = false;
            normalized.push(c);
        }

        format!(
            "{}{}{}{}",
            text[..open].trim_end(),
            start,
            normalized,
            &text[close..]
        )
    }

    /// Split type text into blocks. Whitespace separates; `(...)` groups,
    /// `[...]` (as `[]`), `*` and `&` are single blocks; nothing inside the
    /// generics delimiters splits.
    pub fn separate(&self, text: &str) -> Vec<String> {
        let text = text.split('=').next().unwrap_or("").trim();
        let chars: Vec<char> = text.chars().collect();
        let generics = self.language.generics;

        let mut blocks = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        let mut i = 0;

        fn flush(current: &mut String, blocks: &mut Vec<String>) {
            if !current.is_empty() {
                blocks.push(std::mem::take(current));
            }
        }

        while i < chars.len() {
            let c = chars[i];
            let opens_generics = generics.is_some_and(|(s, _)| s == c)
                && !(c == '[' && is_array_group(&chars, i));
            let closes_generics = depth > 0 && generics.is_some_and(|(_, e)| e == c);

            if opens_generics {
                depth += 1;
                current.push(c);
            } else if closes_generics {
                depth -= 1;
                current.push(c);
            } else if depth > 0 {
                current.push(c);
            } else {
                match c {
                    ' ' | '\t' => flush(&mut current, &mut blocks),
                    '(' => {
                        flush(&mut current, &mut blocks);
                        let close = find_matching(&chars, i, '(', ')');
                        blocks.push(chars[i..=close].iter().collect());
                        i = close;
                    }
                    '[' => {
                        flush(&mut current, &mut blocks);
                        i = find_matching(&chars, i, '[', ']');
                        blocks.push("[]".to_string());
                    }
                    '*' => {
                        flush(&mut current, &mut blocks);
                        blocks.push("*".to_string());
                    }
                    '&' => {
                        flush(&mut current, &mut blocks);
                        blocks.push("&".to_string());
                        // rvalue references collapse into one reference
                        if chars.get(i + 1) == Some(&'&') {
                            i += 1;
                        }
                    }
                    _ => current.push(c),
                }
            }
            i += 1;
        }
        flush(&mut current, &mut blocks);
        blocks
    }

    /// Join consecutive primitive words (`long long`) into one block placed
    /// where the first of them was.
    fn join_primitive(&self, blocks: Vec<String>) -> Vec<String> {
        let mut joined = Vec::new();
        let mut primitive: Vec<String> = Vec::new();
        let mut index = 0;

        for block in blocks {
            if self.language.is_primitive(&block) {
                if primitive.is_empty() {
                    index = joined.len();
                }
                primitive.push(block);
            } else {
                joined.push(block);
            }
        }

        if !primitive.is_empty() {
            joined.insert(index, primitive.join(" "));
        }
        joined
    }
}

/// Index of the bracket closing the one at `open`, or the last index
fn find_matching(chars: &[char], open: usize, open_char: char, close_char: char) -> usize {
    let mut depth = 0usize;
    for (i, c) in chars.iter().enumerate().skip(open) {
        if *c == open_char {
            depth += 1;
        } else if *c == close_char {
            depth -= 1;
            if depth == 0 {
                return i;
            }
        }
    }
    chars.len().saturating_sub(1)
}

/// `[]` or `[42]`, as opposed to `[T]` generics
fn is_array_group(chars: &[char], open: usize) -> bool {
    let close = find_matching(chars, open, '[', ']');
    chars
        .get(open + 1..close)
        .is_some_and(|inner| inner.iter().all(|c| c.is_ascii_digit()))
}

/// Split at `separator` outside of any bracket pair
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c == separator && depth == 0 {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(current.trim().to_string());
    parts
}
