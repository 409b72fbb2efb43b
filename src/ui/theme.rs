use crate::diagnostics::SemanticError;
use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// How much a diagnostic matters to someone reading CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The scope tree was driven inconsistently by the frontend
    Fatal,
    /// Resolution degraded to the unknown type or an empty result
    Degraded,
    /// Resolution succeeded with more than one candidate
    Ambiguous,
}

impl Severity {
    pub fn of(diagnostic: &SemanticError) -> Self {
        match diagnostic {
            SemanticError::StructuralScope { .. } => Severity::Fatal,
            SemanticError::AmbiguousResolution { .. } => Severity::Ambiguous,
            SemanticError::UnresolvedType { .. }
            | SemanticError::UnresolvedReference { .. }
            | SemanticError::UnresolvedCall { .. } => Severity::Degraded,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
    pub type_name: Style,
    pub fatal: Style,
    pub degraded: Style,
    pub ambiguous: Style,
}

impl Theme {
    /// Colors only when stdout is a terminal and `NO_COLOR`/`CLICOLOR` allow it
    pub fn detect() -> Self {
        if console::Term::stdout().is_term() && console::colors_enabled() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            type_name: Style::new().bright_blue().bold(),
            fatal: Style::new().red().bold().underline(),
            degraded: Style::new().yellow(),
            ambiguous: Style::new().bright_magenta(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            success: none,
            error: none,
            warn: none,
            info: none,
            dim: none,
            type_name: none,
            fatal: none,
            degraded: none,
            ambiguous: none,
        }
    }

    pub fn severity(&self, severity: Severity) -> Style {
        match severity {
            Severity::Fatal => self.fatal,
            Severity::Degraded => self.degraded,
            Severity::Ambiguous => self.ambiguous,
        }
    }
}

pub fn theme() -> Theme {
    *THEME.get_or_init(Theme::detect)
}
