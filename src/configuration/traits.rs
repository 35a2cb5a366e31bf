use miette::Result;

/// Conversion from a configuration table as deserialized from TOML into its
/// validated runtime form.
///
/// Deserialization only checks shape; resolving additionally parses and
/// validates the contents (URLs, durations, level filters, mode names), so
/// every invalid value is rejected at startup instead of mid-cycle.
pub trait ResolvableConfiguration {
    type Resolved;

    fn resolve(self) -> Result<Self::Resolved>;
}
