//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Section names, sorted.
    fn sections(&self) -> Vec<String>;

    /// All key/value pairs of a section, sorted by key. Empty when the
    /// section is missing.
    fn section_entries(&self, section: &str) -> Vec<(String, String)>;
}
