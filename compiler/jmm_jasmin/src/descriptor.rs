//! JVM type descriptors and class paths.
//!
//! A class name resolves, in order, to the class being compiled, then to an
//! import whose last segment matches (dots become slashes), then to
//! `java/lang/String` for `String`. Anything else is an unresolved type.

use jmm_ir::{CompileError, CompileResult, IrClass, IrType, Span};

const STRING_PATH: &str = "java/lang/String";
const OBJECT_PATH: &str = "java/lang/Object";

/// Descriptor resolution scoped to one class.
pub struct Descriptors<'a> {
    class: &'a IrClass,
}

impl<'a> Descriptors<'a> {
    pub fn new(class: &'a IrClass) -> Self {
        Descriptors { class }
    }

    /// Internal (slashed) name of a class referenced by simple name.
    pub fn class_path(&self, name: &str) -> CompileResult<String> {
        if name == self.class.name {
            return Ok(name.to_owned());
        }
        if let Some(import) = self
            .class
            .imports
            .iter()
            .find(|path| path.rsplit('.').next() == Some(name))
        {
            return Ok(import.replace('.', "/"));
        }
        if name == "String" {
            return Ok(STRING_PATH.to_owned());
        }
        Err(CompileError::unresolved_type(
            format!("class `{name}` (neither this class nor imported)"),
            Span::DUMMY,
        ))
    }

    /// Internal name of the superclass, `java/lang/Object` when absent.
    pub fn super_path(&self) -> CompileResult<String> {
        match &self.class.superclass {
            Some(sup) => self.class_path(sup),
            None => Ok(OBJECT_PATH.to_owned()),
        }
    }

    pub fn type_desc(&self, ty: &IrType) -> CompileResult<String> {
        Ok(match ty {
            IrType::Int32 => "I".to_owned(),
            IrType::Bool => "Z".to_owned(),
            IrType::Void => "V".to_owned(),
            IrType::Array(elem) => format!("[{}", self.type_desc(elem)?),
            IrType::Class(name) => format!("L{};", self.class_path(name)?),
        })
    }

    /// `(params)ret`
    pub fn method_desc<'t>(
        &self,
        params: impl IntoIterator<Item = &'t IrType>,
        ret: &IrType,
    ) -> CompileResult<String> {
        let mut desc = String::from("(");
        for param in params {
            desc.push_str(&self.type_desc(param)?);
        }
        desc.push(')');
        desc.push_str(&self.type_desc(ret)?);
        Ok(desc)
    }
}
