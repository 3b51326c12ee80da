#[macro_export]
macro_rules! env_var {
    ($name:ident) => {
        const $name: &'static str = stringify!($name);
    };
}

/// Load a required env var into a validated newtype.
#[macro_export]
macro_rules! env_load {
    ($type:ident, $name:ident) => {
        $type::new(
            std::env::var($name)
                .with_context(|| format!("Missing {} env var", $name))?,
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
    ($type:ident, $name:ident, $type_raw:ident) => {
        $type::new(
            std::env::var($name)
                .with_context(|| format!("Missing {} env var", $name))?
                .parse::<$type_raw>()
                .with_context(|| {
                    format!(
                        "{} env var cannot be parsed in the correct type",
                        $name
                    )
                })?,
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
}

/// Load an optional env var. Absent or empty yields `None`, present values
/// must parse.
#[macro_export]
macro_rules! env_load_opt {
    ($type:ident, $name:ident) => {
        match std::env::var($name).ok().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(
                $type::new(raw).with_context(|| {
                    format!("{} was not formatted right", $name)
                })?,
            ),
            None => None,
        }
    };
}

/// Parse an env var with `FromStr`, falling back to `$default` when unset.
#[macro_export]
macro_rules! env_parse_or {
    ($type_raw:ty, $name:ident, $default:expr) => {
        match std::env::var($name).ok().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => raw.trim().parse::<$type_raw>().with_context(|| {
                format!(
                    "{} env var cannot be parsed in the correct type",
                    $name
                )
            })?,
            None => $default,
        }
    };
}
