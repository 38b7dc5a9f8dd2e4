//! Program front-end.
//!
//! Programs are WGSL text. The front-end parses OpenCL style build options into `const`
//! declarations, scans the text for `@compute` entry points and resource bindings, and produces
//! the per-launch source with the `WORKGROUP_SIZE` and `TILE_LEN` constants prepended.

use core::fmt::{Display, Write};
use std::path::Path;

use crate::{ArgKind, ComputeError, ComputeResult, KernelDefinition, ProgramId, server::KernelKey};

/// Names reserved for the per-launch constants.
pub const RESERVED_CONSTANTS: [&str; 2] = ["WORKGROUP_SIZE", "TILE_LEN"];

/// WGSL program text with a name used in logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    name: String,
    text: String,
}

impl ProgramSource {
    /// Create a source from text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Load a source file.
    pub fn load<P: AsRef<Path>>(path: P) -> ComputeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ComputeError::BuildFailure {
            log: format!("Can't read program source {}: {err}", path.display()),
        })?;

        Ok(Self::new(path.display().to_string(), text))
    }

    /// The source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The program text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Names of the `@compute` entry points, in declaration order.
    pub fn entry_points(&self) -> Vec<String> {
        let tokens = tokenize(&self.text);
        let mut entries = Vec::new();
        let mut compute = false;

        for (index, token) in tokens.iter().enumerate() {
            match token.text {
                "@compute" => compute = true,
                "fn" if compute => {
                    if let Some(name) = tokens.get(index + 1) {
                        entries.push(name.text.to_string());
                    }
                    compute = false;
                }
                _ => {}
            }
        }

        entries
    }

    /// Resource bindings, sorted by binding number.
    ///
    /// A declaration without `@group` is reported in group 0.
    pub fn bindings(&self) -> Vec<Binding> {
        let tokens = tokenize(&self.text);
        let mut bindings = Vec::new();

        for (index, token) in tokens.iter().enumerate() {
            if token.text != "@binding" {
                continue;
            }

            let Some(number) = tokens
                .get(index + 2)
                .and_then(|number| parse_integer(number.text))
            else {
                continue;
            };

            // `var` `<` address space [`,` access] `>` name
            let Some(var) = tokens[index..].iter().position(|t| t.text == "var") else {
                continue;
            };

            // The attributes of this declaration run from the end of the previous one to `var`.
            let start = tokens[..index]
                .iter()
                .rposition(|t| matches!(t.text, ";" | "{" | "}"))
                .map_or(0, |end| end + 1);
            let group = tokens[start..index + var]
                .iter()
                .position(|t| t.text == "@group")
                .and_then(|at| tokens.get(start + at + 2))
                .and_then(|number| parse_integer(number.text))
                .unwrap_or(0);
            let rest = &tokens[index + var + 1..];
            let kind = if rest.first().map(|t| t.text) == Some("<") {
                let close = rest.iter().position(|t| t.text == ">").unwrap_or(rest.len());
                let qualifiers: Vec<&str> = rest[1..close]
                    .iter()
                    .map(|t| t.text)
                    .filter(|t| *t != ",")
                    .collect();
                BindingKind::from_qualifiers(&qualifiers)
            } else {
                BindingKind::Other
            };

            bindings.push(Binding {
                group,
                ordinal: number,
                kind,
                line: token.line,
            });
        }

        bindings.sort_by_key(|binding| binding.ordinal);
        bindings
    }

    /// Structural checks done before handing the text to a backend.
    fn validate(&self) -> Result<(), String> {
        let mut stack = Vec::new();

        for token in tokenize(&self.text) {
            match token.text {
                "{" | "(" | "[" => stack.push(token),
                "}" | ")" | "]" => {
                    let expected = match token.text {
                        "}" => "{",
                        ")" => "(",
                        _ => "[",
                    };
                    match stack.pop() {
                        Some(open) if open.text == expected => {}
                        Some(open) => {
                            return Err(format!(
                                "{}:{}: '{}' closes '{}' opened at line {}",
                                self.name, token.line, token.text, open.text, open.line
                            ));
                        }
                        None => {
                            return Err(format!(
                                "{}:{}: unmatched '{}'",
                                self.name, token.line, token.text
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(format!(
                "{}:{}: '{}' is never closed",
                self.name, open.line, open.text
            ));
        }

        if self.entry_points().is_empty() {
            return Err(format!("{}: no @compute entry point", self.name));
        }

        if let Some(binding) = self.bindings().iter().find(|b| b.group != 0) {
            return Err(format!(
                "{}:{}: binding {} is in group {}, arguments bind to group 0 only",
                self.name, binding.line, binding.ordinal, binding.group
            ));
        }

        Ok(())
    }
}

/// Options applied when building a program.
///
/// Accepts `-D NAME=VALUE`, `-DNAME=VALUE` and `-DNAME`; each define becomes a WGSL `const`
/// declaration, with `true` as the value of a bare name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildOptions {
    defines: Vec<(String, Option<String>)>,
}

impl BuildOptions {
    /// Parse an option string.
    pub fn parse(options: &str) -> ComputeResult<Self> {
        let mut defines: Vec<(String, Option<String>)> = Vec::new();
        let mut words = options.split_whitespace();

        while let Some(word) = words.next() {
            let define = match word.strip_prefix("-D") {
                Some("") => words
                    .next()
                    .ok_or_else(|| build_failure("'-D' expects a definition"))?,
                Some(define) => define,
                None => return Err(build_failure(format!("unknown build option '{word}'"))),
            };

            let (name, value) = match define.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (define, None),
            };

            if !is_identifier(name) {
                return Err(build_failure(format!("invalid define name '{name}'")));
            }
            if RESERVED_CONSTANTS.contains(&name) {
                return Err(build_failure(format!(
                    "'{name}' is reserved for the launch configuration"
                )));
            }
            if let Some(value) = &value {
                if value.is_empty() {
                    return Err(build_failure(format!("'{name}' has an empty value")));
                }
            }

            match defines.iter_mut().find(|(existing, _)| existing == name) {
                Some(existing) => existing.1 = value,
                None => defines.push((name.to_string(), value)),
            }
        }

        Ok(Self { defines })
    }

    /// The parsed defines.
    pub fn defines(&self) -> &[(String, Option<String>)] {
        &self.defines
    }

    /// WGSL declarations for the defines.
    pub fn preamble(&self) -> String {
        let mut preamble = String::new();
        for (name, value) in self.defines.iter() {
            let value = value.as_deref().unwrap_or("true");
            writeln!(preamble, "const {name} = {value};").ok();
        }
        preamble
    }
}

impl Display for BuildOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (index, (name, value)) in self.defines.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            match value {
                Some(value) => write!(f, "-D {name}={value}")?,
                None => write!(f, "-D {name}")?,
            }
        }
        Ok(())
    }
}

/// A program that passed the front-end checks.
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    source: ProgramSource,
    options: BuildOptions,
    entry_points: Vec<String>,
}

impl Program {
    /// Run the front-end checks.
    pub fn new(source: ProgramSource, options: BuildOptions) -> ComputeResult<Self> {
        source
            .validate()
            .map_err(|log| ComputeError::BuildFailure { log })?;
        let entry_points = source.entry_points();

        Ok(Self {
            id: ProgramId::new(),
            source,
            options,
            entry_points,
        })
    }

    /// The program id.
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// The source.
    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    /// The build options.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The `@compute` entry points.
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    /// Whether the program declares an entry point.
    pub fn has_entry_point(&self, name: &str) -> bool {
        self.entry_points.iter().any(|entry| entry == name)
    }

    /// The program text with the launch constants and the build options prepended.
    pub fn specialize(&self, key: &KernelKey) -> String {
        self.specialize_with(key.workgroup_size, key.tile_len)
    }

    /// The program text with the given launch constants.
    pub fn specialize_with(&self, workgroup_size: u32, tile_len: u32) -> String {
        format!(
            "const WORKGROUP_SIZE: u32 = {workgroup_size}u;\nconst TILE_LEN: u32 = {tile_len}u;\n{}\n{}",
            self.options.preamble(),
            self.source.text
        )
    }

    /// Check the declared bindings against a host definition.
    ///
    /// Binding `n` of group 0 is argument `n`: a `uniform` holds an integer, `storage, read` a
    /// read buffer and `storage, read_write` any buffer. Local scratch arguments have no binding.
    pub fn check_interface(&self, definition: &KernelDefinition) -> ComputeResult<()> {
        let mismatch = |ordinal: usize, reason: String| ComputeError::ArgumentMismatch {
            kernel: definition.entry.to_string(),
            ordinal,
            reason,
        };

        if !self.has_entry_point(definition.entry) {
            return Err(mismatch(
                0,
                format!("no entry point '{}' in {}", definition.entry, self.source.name),
            ));
        }

        let bindings = self.source.bindings();
        for (ordinal, kind) in definition.args.iter().enumerate() {
            let binding = bindings.iter().find(|b| b.ordinal == ordinal);

            let compatible = match (kind, binding.map(|b| b.kind)) {
                (ArgKind::Int, Some(BindingKind::Uniform)) => true,
                (ArgKind::Buffer(crate::Access::Read), Some(BindingKind::StorageRead)) => true,
                (ArgKind::Buffer(_), Some(BindingKind::StorageReadWrite)) => true,
                (ArgKind::LocalScratch, None) => true,
                _ => false,
            };

            if !compatible {
                let declared = match binding {
                    Some(binding) => format!("binding {}", binding.kind),
                    None => "no binding".to_string(),
                };
                return Err(mismatch(
                    ordinal,
                    format!("expected {kind}, the program declares {declared}"),
                ));
            }
        }

        if let Some(extra) = bindings.iter().find(|b| b.ordinal >= definition.args.len()) {
            return Err(mismatch(
                extra.ordinal,
                format!("the program declares {} with no argument", extra.kind),
            ));
        }

        Ok(())
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Program {} [{}]", self.source.name, self.id)?;
        writeln!(f, "Options: {}", self.options)?;
        writeln!(f, "Entry points: {}", self.entry_points.join(", "))?;
        write!(f, "{}", self.source.text)
    }
}

/// A resource binding declared by a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    /// Bind group number. Only group 0 can be built.
    pub group: usize,
    /// Binding number, equal to the argument ordinal.
    pub ordinal: usize,
    /// Declared resource kind.
    pub kind: BindingKind,
    /// Source line of the `@binding` attribute.
    pub line: usize,
}

/// The kind of a resource binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum BindingKind {
    /// `var<uniform>`.
    #[display("uniform")]
    Uniform,
    /// `var<storage>` or `var<storage, read>`.
    #[display("storage(read)")]
    StorageRead,
    /// `var<storage, read_write>`.
    #[display("storage(read_write)")]
    StorageReadWrite,
    /// Textures, samplers and anything else.
    #[display("other")]
    Other,
}

impl BindingKind {
    fn from_qualifiers(qualifiers: &[&str]) -> Self {
        match qualifiers {
            ["uniform"] => BindingKind::Uniform,
            ["storage"] | ["storage", "read"] => BindingKind::StorageRead,
            ["storage", "read_write"] => BindingKind::StorageReadWrite,
            _ => BindingKind::Other,
        }
    }
}

fn build_failure(log: impl Into<String>) -> ComputeError {
    ComputeError::BuildFailure { log: log.into() }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_integer(text: &str) -> Option<usize> {
    text.trim_end_matches(['u', 'i']).parse().ok()
}

#[derive(Clone, Copy, Debug)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

// Splits WGSL into identifiers, numbers, attributes and single punctuation characters,
// skipping comments.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'\n' {
            line += 1;
            i += 1;
        } else if b.is_ascii_whitespace() {
            i += 1;
        } else if bytes[i..].starts_with(b"//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i..].starts_with(b"/*") {
            // Block comments nest in WGSL.
            let mut depth = 0;
            while i < bytes.len() {
                if bytes[i..].starts_with(b"/*") {
                    depth += 1;
                    i += 2;
                } else if bytes[i..].starts_with(b"*/") {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        break;
                    }
                } else {
                    if bytes[i] == b'\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
        } else if is_word(b) || b == b'@' {
            let start = i;
            i += 1;
            while i < bytes.len() && is_word(bytes[i]) {
                i += 1;
            }
            tokens.push(Token {
                text: &text[start..i],
                line,
            });
        } else {
            let len = text[i..].chars().next().map(char::len_utf8).unwrap_or(1);
            tokens.push(Token {
                text: &text[i..i + len],
                line,
            });
            i += len;
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Access;

    const SOURCE: &str = r#"
        // @compute fn commented_out() {}
        @group(0) @binding(0) var<uniform> n: u32;
        @group(0) @binding(1) var<storage, read> a: array<f32>;
        @group(0) @binding(2) var<storage, read_write> c: array<f32>;
        var<workgroup> tile: array<f32, TILE_LEN>;

        /* helper, not an entry point */
        fn helper(x: f32) -> f32 { return x; }

        @compute @workgroup_size(WORKGROUP_SIZE)
        fn first(@builtin(global_invocation_id) id: vec3<u32>) {
            c[id.x] = helper(a[id.x]);
        }

        @compute
        @workgroup_size(WORKGROUP_SIZE, 1, 1)
        fn second(@builtin(global_invocation_id) id: vec3<u32>) {
            tile[0] = a[id.x];
        }
    "#;

    fn program() -> Program {
        Program::new(
            ProgramSource::new("test.wgsl", SOURCE),
            BuildOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn scans_entry_points() {
        assert_eq!(program().entry_points(), ["first", "second"]);
    }

    #[test]
    fn scans_bindings() {
        let bindings = ProgramSource::new("test.wgsl", SOURCE).bindings();

        assert_eq!(
            bindings.iter().map(|b| b.kind).collect::<Vec<_>>(),
            [
                BindingKind::Uniform,
                BindingKind::StorageRead,
                BindingKind::StorageReadWrite
            ]
        );
    }

    #[test]
    fn bindings_outside_group_zero_fail_the_build() {
        let text = "@group(0) @binding(0) var<uniform> n: u32;\n\
                    @group(1) @binding(1) var<storage, read> a: array<f32>;\n\
                    @compute @workgroup_size(1)\nfn main() {}";
        let source = ProgramSource::new("groups.wgsl", text);

        assert_eq!(
            source.bindings().iter().map(|b| b.group).collect::<Vec<_>>(),
            [0, 1]
        );
        match Program::new(source, BuildOptions::default()) {
            Err(ComputeError::BuildFailure { log }) => {
                assert!(log.starts_with("groups.wgsl:2:"), "{log}");
                assert!(log.contains("group 1"), "{log}");
            }
            other => panic!("expected a build failure, got {other:?}"),
        }
    }

    #[test]
    fn parses_build_options() {
        let options = BuildOptions::parse("-D ORDER=1024 -DUNROLL -DORDER=512").unwrap();

        assert_eq!(
            options.defines(),
            [
                ("ORDER".to_string(), Some("512".to_string())),
                ("UNROLL".to_string(), None)
            ]
        );
        assert_eq!(
            options.preamble(),
            "const ORDER = 512;\nconst UNROLL = true;\n"
        );
        assert_eq!(options.to_string(), "-D ORDER=512 -D UNROLL");
    }

    #[test]
    fn rejects_unknown_build_options() {
        for options in ["-cl-fast-relaxed-math", "-D", "-D 1X", "-DTILE_LEN=4", "-DX="] {
            assert!(
                matches!(
                    BuildOptions::parse(options),
                    Err(ComputeError::BuildFailure { .. })
                ),
                "{options}"
            );
        }
    }

    #[test]
    fn unbalanced_source_fails_with_a_log() {
        let source = ProgramSource::new("broken.wgsl", "@compute fn main() { let x = (1;\n}");
        let err = Program::new(source, BuildOptions::default()).unwrap_err();

        match err {
            ComputeError::BuildFailure { log } => assert!(log.starts_with("broken.wgsl:"), "{log}"),
            err => panic!("unexpected {err:?}"),
        }
    }

    #[test]
    fn source_without_entry_point_fails() {
        let source = ProgramSource::new("empty.wgsl", "fn helper() {}");

        assert!(matches!(
            Program::new(source, BuildOptions::default()),
            Err(ComputeError::BuildFailure { .. })
        ));
    }

    #[test]
    fn specialisation_prepends_constants() {
        let options = BuildOptions::parse("-D SCALE=2.0").unwrap();
        let program = Program::new(ProgramSource::new("test.wgsl", SOURCE), options).unwrap();

        let text = program.specialize(&KernelKey::new(program.id(), "first", 64, 256));

        assert!(text.starts_with(
            "const WORKGROUP_SIZE: u32 = 64u;\nconst TILE_LEN: u32 = 256u;\nconst SCALE = 2.0;\n"
        ));
    }

    #[test]
    fn interface_check() {
        let program = program();
        let matching = KernelDefinition {
            entry: "first",
            args: &[
                ArgKind::Int,
                ArgKind::Buffer(Access::Read),
                ArgKind::Buffer(Access::Write),
                ArgKind::LocalScratch,
            ],
        };
        assert_eq!(program.check_interface(&matching), Ok(()));

        let wrong_access = KernelDefinition {
            entry: "first",
            args: &[
                ArgKind::Int,
                ArgKind::Buffer(Access::Write),
                ArgKind::Buffer(Access::Write),
            ],
        };
        assert!(matches!(
            program.check_interface(&wrong_access),
            Err(ComputeError::ArgumentMismatch { ordinal: 1, .. })
        ));

        let too_short = KernelDefinition {
            entry: "first",
            args: &[ArgKind::Int, ArgKind::Buffer(Access::Read)],
        };
        assert!(matches!(
            program.check_interface(&too_short),
            Err(ComputeError::ArgumentMismatch { ordinal: 2, .. })
        ));

        let missing = KernelDefinition {
            entry: "third",
            args: &[],
        };
        assert!(matches!(
            program.check_interface(&missing),
            Err(ComputeError::ArgumentMismatch { .. })
        ));
    }
}
