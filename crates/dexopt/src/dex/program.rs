use std::collections::HashMap;

use super::code::DexCode;

/// Constant-pool tables for one optimization session.
///
/// Replaces the global registry of the original runtime: every construction
/// or lookup that needs interning takes the context explicitly, so nothing
/// outlives the session and parallel sessions cannot interfere.
#[derive(Debug, Default)]
pub struct DexContext {
    strings: Vec<String>,
    string_ids: HashMap<String, u32>,
    types: Vec<String>,
    type_ids: HashMap<String, u32>,
    methods: Vec<MethodRef>,
    fields: Vec<FieldRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: String,
    pub name: String,
    pub proto: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    pub type_name: String,
}

impl DexContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_string(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.string_ids.get(value) {
            return idx;
        }
        let idx = u32::try_from(self.strings.len()).expect("string pool overflow");
        self.strings.push(value.to_owned());
        self.string_ids.insert(value.to_owned(), idx);
        idx
    }

    pub fn intern_type(&mut self, descriptor: &str) -> u32 {
        if let Some(&idx) = self.type_ids.get(descriptor) {
            return idx;
        }
        let idx = u32::try_from(self.types.len()).expect("type pool overflow");
        self.types.push(descriptor.to_owned());
        self.type_ids.insert(descriptor.to_owned(), idx);
        idx
    }

    pub fn add_method(&mut self, method: MethodRef) -> u32 {
        let idx = u32::try_from(self.methods.len()).expect("method pool overflow");
        self.methods.push(method);
        idx
    }

    pub fn add_field(&mut self, field: FieldRef) -> u32 {
        let idx = u32::try_from(self.fields.len()).expect("field pool overflow");
        self.fields.push(field);
        idx
    }

    #[must_use]
    pub fn string(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    #[must_use]
    pub fn type_descriptor(&self, idx: u32) -> Option<&str> {
        self.types.get(idx as usize).map(String::as_str)
    }

    #[must_use]
    pub fn method(&self, idx: u32) -> Option<&MethodRef> {
        self.methods.get(idx as usize)
    }

    #[must_use]
    pub fn field(&self, idx: u32) -> Option<&FieldRef> {
        self.fields.get(idx as usize)
    }
}

/// A method with an optional code body. Abstract and native methods carry
/// no code and are skipped by optimization passes.
#[derive(Debug, Clone)]
pub struct DexMethod {
    pub name: String,
    pub code: Option<DexCode>,
}

impl DexMethod {
    #[must_use]
    pub fn new(name: impl Into<String>, code: Option<DexCode>) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    #[must_use]
    pub fn abstract_method(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }
}

#[derive(Debug, Clone)]
pub struct DexClass {
    pub name: String,
    pub methods: Vec<DexMethod>,
}

impl DexClass {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn add_method(&mut self, method: DexMethod) {
        self.methods.push(method);
    }

    pub fn remove_method(&mut self, name: &str) {
        self.methods.retain(|m| m.name != name);
    }
}

/// The decoded program: every class of the application, in program order.
#[derive(Debug, Default)]
pub struct DexProgram {
    pub classes: Vec<DexClass>,
}

impl DexProgram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, class: DexClass) {
        self.classes.push(class);
    }

    /// Total number of methods that carry code.
    #[must_use]
    pub fn concrete_method_count(&self) -> usize {
        self.classes
            .iter()
            .flat_map(|class| class.methods.iter())
            .filter(|method| method.code.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut context = DexContext::new();
        let a = context.intern_string("hello");
        let b = context.intern_string("world");
        assert_ne!(a, b);
        assert_eq!(context.intern_string("hello"), a);
        assert_eq!(context.string(a), Some("hello"));
        assert_eq!(context.string(99), None);
    }

    #[test]
    fn concrete_method_count_skips_codeless() {
        let mut class = DexClass::new("Lcom/example/Foo;");
        class.add_method(DexMethod::new("bar", Some(DexCode::empty())));
        class.add_method(DexMethod::abstract_method("baz"));
        let mut program = DexProgram::new();
        program.add_class(class);
        assert_eq!(program.concrete_method_count(), 1);
    }
}
