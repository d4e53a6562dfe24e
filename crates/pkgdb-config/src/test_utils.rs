/// Runs `f` with the given variables set (`Some`) or removed (`None`), then
/// restores their previous values.
pub fn with_env<F>(vars: &[(&str, Option<&str>)], f: F)
where
    F: FnOnce(),
{
    let saved: Vec<_> = vars
        .iter()
        .map(|(key, _)| (*key, std::env::var(key).ok()))
        .collect();

    for (key, value) in vars {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }

    f();

    for (key, previous) in saved {
        match previous {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
