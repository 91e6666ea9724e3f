//! File discovery: which files in the drop directory belong to which supplier.

use chipline_models::Supplier;

use crate::config::SourceConfig;

/// Test applied to a file's base name (the text before its first `.`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingRule {
    DigitsOnly,
    Prefix(String),
    Contains(String),
}

impl NamingRule {
    pub fn matches(&self, base: &str) -> bool {
        match self {
            Self::DigitsOnly => !base.is_empty() && base.chars().all(|c| c.is_ascii_digit()),
            Self::Prefix(prefix) => base.starts_with(prefix.as_str()),
            Self::Contains(code) => base.contains(code.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileSelector {
    extensions: Vec<String>,
    bonding: NamingRule,
    assembly: NamingRule,
    final_test_a: NamingRule,
    final_test_b: NamingRule,
}

impl FileSelector {
    pub fn from_config(source: &SourceConfig) -> Self {
        Self {
            extensions: source.extensions.clone(),
            bonding: NamingRule::DigitsOnly,
            assembly: NamingRule::Prefix(source.assembly_prefix.clone()),
            final_test_a: NamingRule::Contains(source.final_test_a_code.clone()),
            final_test_b: NamingRule::Contains(source.final_test_b_code.clone()),
        }
    }

    pub fn rule(&self, supplier: Supplier) -> &NamingRule {
        match supplier {
            Supplier::BondingPartner => &self.bonding,
            Supplier::AssemblySubcontractor => &self.assembly,
            Supplier::FinalTestSubcontractorA => &self.final_test_a,
            Supplier::FinalTestSubcontractorB => &self.final_test_b,
        }
    }

    /// Whether `file_name` belongs to `supplier`. Extension checks are on the
    /// last `.`, naming rules on the text before the first `.`.
    pub fn accepts(&self, supplier: Supplier, file_name: &str) -> bool {
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return false;
        };
        if !self.extensions.iter().any(|allowed| allowed == extension) {
            return false;
        }
        let base = file_name.split('.').next().unwrap_or_default();
        self.rule(supplier).matches(base)
    }

    /// Candidate files for `supplier`, sorted so the extraction log is stable.
    /// No match is an empty list, not an error.
    pub fn select<S: AsRef<str>>(&self, listing: &[S], supplier: Supplier) -> Vec<String> {
        let mut files: Vec<String> = listing
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| self.accepts(supplier, name))
            .map(str::to_string)
            .collect();
        files.sort();
        files
    }
}

impl Default for FileSelector {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}
