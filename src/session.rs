//! Compilation session: owns the emitted CSS unit registry the host loads
//! units from, and rebuilds a file's units on every recompilation

use crate::error::Result;
use crate::types::{EmittedCssUnit, VIRTUAL_UNIT_PREFIX};
use crate::{compile_source_with_options, CompileOutput, CompilerOptions};
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct CompilationSession {
    options: CompilerOptions,
    /// unit key -> unit
    units: HashMap<String, EmittedCssUnit>,
    /// file -> keys of the units it currently owns
    files: HashMap<String, Vec<String>>,
}

impl CompilationSession {
    pub fn new(options: CompilerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            units: HashMap::new(),
            files: HashMap::new(),
        })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles one file and replaces every unit it produced before. A failed
    /// compilation leaves the previous units in place.
    pub fn compile(&mut self, source: &str, filename: &str) -> Result<Option<CompileOutput>> {
        let output = compile_source_with_options(source, filename, &self.options)?;
        self.register(filename, output.as_ref());
        Ok(output)
    }

    /// Compiles `(filename, source)` pairs in parallel. Results are
    /// registered and returned in input order.
    pub fn compile_many<S: AsRef<str> + Sync>(
        &mut self,
        inputs: &[(S, S)],
    ) -> Vec<Result<Option<CompileOutput>>> {
        let options = &self.options;
        let results: Vec<Result<Option<CompileOutput>>> = inputs
            .par_iter()
            .map(|(filename, source)| {
                compile_source_with_options(source.as_ref(), filename.as_ref(), options)
            })
            .collect();

        for ((filename, _), result) in inputs.iter().zip(&results) {
            if let Ok(output) = result {
                self.register(filename.as_ref(), output.as_ref());
            }
        }
        results
    }

    fn register(&mut self, filename: &str, output: Option<&CompileOutput>) {
        self.invalidate(filename);
        let Some(output) = output else {
            return;
        };

        let mut keys = Vec::with_capacity(output.css_units.len());
        for unit in &output.css_units {
            if let Some(owner) = self.owner_of(&unit.key) {
                log::warn!(
                    "CSS unit {} from {} replaces the unit of {} (file hash collision)",
                    unit.key,
                    filename,
                    owner
                );
            }
            keys.push(unit.key.clone());
            self.units.insert(unit.key.clone(), unit.clone());
        }
        log::debug!("Registered {} CSS units for {}", keys.len(), filename);
        self.files.insert(filename.to_string(), keys);
    }

    fn owner_of(&self, key: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(_, keys)| keys.iter().any(|owned| owned == key))
            .map(|(file, _)| file.as_str())
    }

    /// Drops every unit `filename` produced. Returns how many were removed.
    pub fn invalidate(&mut self, filename: &str) -> usize {
        let Some(keys) = self.files.remove(filename) else {
            return 0;
        };
        for key in &keys {
            self.units.remove(key);
        }
        keys.len()
    }

    /// CSS for a unit, addressed by key or by its virtual import specifier
    pub fn load_css(&self, id: &str) -> Option<&str> {
        self.unit(id).map(|unit| unit.css.as_str())
    }

    pub fn unit(&self, id: &str) -> Option<&EmittedCssUnit> {
        let key = id.strip_prefix(VIRTUAL_UNIT_PREFIX).unwrap_or(id);
        self.units.get(key)
    }

    /// Units `filename` currently owns, in ordinal order
    pub fn units_for(&self, filename: &str) -> Vec<&EmittedCssUnit> {
        self.files
            .get(filename)
            .map(|keys| keys.iter().filter_map(|key| self.units.get(key)).collect())
            .unwrap_or_default()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn clear(&mut self) {
        self.units.clear();
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BrowserTargets;

    fn session() -> CompilationSession {
        CompilationSession::new(CompilerOptions {
            targets: BrowserTargets::Disabled,
            ..CompilerOptions::default()
        })
        .unwrap()
    }

    const TWO_UNITS: &str = "import { css } from 'stylec';\nconst a = css`color: red;`;\nconst b = css`color: blue;`;\n";
    const ONE_UNIT: &str = "import { css } from 'stylec';\nconst a = css`color: green;`;\n";

    #[test]
    fn test_recompile_replaces_previous_units() {
        let mut session = session();
        let first = session.compile(TWO_UNITS, "src/a.ts").unwrap().unwrap();
        assert_eq!(session.unit_count(), 2);
        let stale_key = first.css_units[1].key.clone();

        session.compile(ONE_UNIT, "src/a.ts").unwrap().unwrap();
        assert_eq!(session.unit_count(), 1);
        assert!(session.load_css(&stale_key).is_none());
        assert!(session.units_for("src/a.ts")[0].css.contains("green"));
    }

    #[test]
    fn test_file_without_constructs_drops_its_units() {
        let mut session = session();
        session.compile(TWO_UNITS, "src/a.ts").unwrap();
        assert!(session.compile("const x = 1;", "src/a.ts").unwrap().is_none());
        assert_eq!(session.unit_count(), 0);
        assert_eq!(session.file_count(), 0);
    }

    #[test]
    fn test_load_css_by_key_or_specifier() {
        let mut session = session();
        let output = session.compile(ONE_UNIT, "src/a.ts").unwrap().unwrap();
        let unit = &output.css_units[0];
        assert_eq!(session.load_css(&unit.key), Some(unit.css.as_str()));
        assert_eq!(session.load_css(&unit.import_specifier), Some(unit.css.as_str()));
        assert_eq!(session.load_css("ffffff-9.css"), None);
    }

    #[test]
    fn test_failed_compile_keeps_previous_units() {
        let mut session = session();
        session.compile(ONE_UNIT, "src/a.ts").unwrap();
        let broken = "import { createGlobalStyle } from 'stylec';\nconst G = createGlobalStyle`..x { }`;\n";
        assert!(session.compile(broken, "src/a.ts").is_err());
        assert_eq!(session.unit_count(), 1);
    }

    #[test]
    fn test_compile_many_in_input_order() {
        let mut session = session();
        let inputs = vec![
            ("src/a.ts", TWO_UNITS),
            ("src/b.ts", "const nothing = 0;"),
            ("src/c.ts", ONE_UNIT),
        ];
        let results = session.compile_many(&inputs);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().as_ref().unwrap().file, "src/a.ts");
        assert!(results[1].as_ref().unwrap().is_none());
        assert_eq!(results[2].as_ref().unwrap().as_ref().unwrap().file, "src/c.ts");
        assert_eq!(session.unit_count(), 3);
        assert_eq!(session.file_count(), 2);

        assert_eq!(session.invalidate("src/a.ts"), 2);
        assert_eq!(session.unit_count(), 1);
    }
}
