// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::handler::Handler;
use crate::settings::ConfigError;
use std::collections::HashMap;
use std::sync::Arc;

/// A function as configured: its name, its entry point and the directory
/// holding its code.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    pub name: String,
    /// Entry point, as `module.symbol`.
    pub handler: String,
    pub codedir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub module: String,
    pub symbol: String,
}

impl std::str::FromStr for EntryPoint {
    type Err = ConfigError;

    /// The symbol follows the last dot, so that module names may contain dots.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().rsplit_once('.') {
            Some((module, symbol)) if !module.is_empty() && !symbol.is_empty() => Ok(Self {
                module: module.to_string(),
                symbol: symbol.to_string(),
            }),
            _ => Err(ConfigError::InvalidEntryPoint(s.to_string())),
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{}", self.module, self.symbol)
    }
}

/// Handlers compiled into the daemon, addressed by module and symbol.
#[derive(Default)]
pub struct HandlerCatalog {
    modules: HashMap<String, HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: &str, symbol: &str, handler: Arc<dyn Handler>) {
        if self
            .modules
            .entry(module.to_string())
            .or_default()
            .insert(symbol.to_string(), handler)
            .is_some()
        {
            log::warn!("built-in handler {}.{} registered twice", module, symbol);
        }
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    fn get(&self, entry_point: &EntryPoint) -> Option<Arc<dyn Handler>> {
        self.modules.get(&entry_point.module)?.get(&entry_point.symbol).cloned()
    }
}

/// Immutable mapping from function names to handlers, built once at startup.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Bind every function to its handler.
    ///
    /// Modules found in `catalog` are served by the built-in handlers, any
    /// other module is loaded as a native library from the function's codedir.
    pub fn load(specs: &[FunctionSpec], catalog: &HandlerCatalog) -> Result<Self, ConfigError> {
        let mut handlers: HashMap<String, Arc<dyn Handler>> = HashMap::new();
        for spec in specs {
            if spec.name.is_empty() || spec.handler.is_empty() || spec.codedir.is_empty() {
                return Err(ConfigError::MissingFunctionField);
            }
            if handlers.contains_key(&spec.name) {
                return Err(ConfigError::DuplicateFunction(spec.name.clone()));
            }
            let entry_point = spec.handler.parse::<EntryPoint>()?;
            let handler: Arc<dyn Handler> = if catalog.has_module(&entry_point.module) {
                match catalog.get(&entry_point) {
                    Some(handler) => {
                        log::info!("function {} bound to built-in handler {}", spec.name, entry_point);
                        handler
                    }
                    None => {
                        return Err(ConfigError::SymbolNotExported {
                            module: entry_point.module,
                            symbol: entry_point.symbol,
                        })
                    }
                }
            } else {
                let handler = crate::native_runner::NativeHandler::load(&spec.codedir, &entry_point)?;
                log::info!("function {} bound to native handler {} in {}", spec.name, entry_point, spec.codedir);
                Arc::new(handler)
            };
            handlers.insert(spec.name.clone(), handler);
        }
        Ok(Self { handlers })
    }

    pub fn resolve(&self, function_name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(function_name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
