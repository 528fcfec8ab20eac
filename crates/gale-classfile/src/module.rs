use crate::constant_pool::{ConstantPool, ConstantPoolBuilder};
use crate::error::Result;
use crate::reader::Reader;
use crate::writer::Writer;

/// The `Module` attribute of a `module-info.class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAttribute {
    pub name: String,
    pub flags: u16,
    pub version: Option<String>,
    pub requires: Vec<ModuleRequire>,
    pub exports: Vec<ModuleExport>,
    pub opens: Vec<ModuleExport>,
    /// Service interfaces, as internal class names.
    pub uses: Vec<String>,
    pub provides: Vec<ModuleProvide>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequire {
    pub module: String,
    pub flags: u16,
    pub version: Option<String>,
}

/// An `exports` or `opens` entry; an empty `to` list means unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExport {
    pub package: String,
    pub flags: u16,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProvide {
    pub service: String,
    pub implementations: Vec<String>,
}

impl ModuleAttribute {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let name = cp.get_module_name(reader.u2()?)?;
        let flags = reader.u2()?;
        let version_index = reader.u2()?;
        let version = if version_index == 0 {
            None
        } else {
            Some(cp.get_utf8(version_index)?.to_string())
        };

        let requires_count = reader.u2()? as usize;
        let mut requires = Vec::with_capacity(requires_count);
        for _ in 0..requires_count {
            let module = cp.get_module_name(reader.u2()?)?;
            let flags = reader.u2()?;
            let version_index = reader.u2()?;
            let version = if version_index == 0 {
                None
            } else {
                Some(cp.get_utf8(version_index)?.to_string())
            };
            requires.push(ModuleRequire {
                module,
                flags,
                version,
            });
        }

        let exports = parse_export_list(reader, cp)?;
        let opens = parse_export_list(reader, cp)?;

        let uses_count = reader.u2()? as usize;
        let mut uses = Vec::with_capacity(uses_count);
        for _ in 0..uses_count {
            uses.push(cp.get_class_name(reader.u2()?)?);
        }

        let provides_count = reader.u2()? as usize;
        let mut provides = Vec::with_capacity(provides_count);
        for _ in 0..provides_count {
            let service = cp.get_class_name(reader.u2()?)?;
            let with_count = reader.u2()? as usize;
            let mut implementations = Vec::with_capacity(with_count);
            for _ in 0..with_count {
                implementations.push(cp.get_class_name(reader.u2()?)?);
            }
            provides.push(ModuleProvide {
                service,
                implementations,
            });
        }

        Ok(Self {
            name,
            flags,
            version,
            requires,
            exports,
            opens,
            uses,
            provides,
        })
    }

    pub(crate) fn write(&self, w: &mut Writer, pool: &mut ConstantPoolBuilder) -> Result<()> {
        w.write_u2(pool.module(&self.name)?);
        w.write_u2(self.flags);
        match &self.version {
            None => w.write_u2(0),
            Some(version) => w.write_u2(pool.utf8(version)?),
        }

        w.write_u2(self.requires.len() as u16);
        for req in &self.requires {
            w.write_u2(pool.module(&req.module)?);
            w.write_u2(req.flags);
            match &req.version {
                None => w.write_u2(0),
                Some(version) => w.write_u2(pool.utf8(version)?),
            }
        }

        write_export_list(w, pool, &self.exports)?;
        write_export_list(w, pool, &self.opens)?;

        w.write_u2(self.uses.len() as u16);
        for service in &self.uses {
            w.write_u2(pool.class_info(service)?);
        }

        w.write_u2(self.provides.len() as u16);
        for provide in &self.provides {
            w.write_u2(pool.class_info(&provide.service)?);
            w.write_u2(provide.implementations.len() as u16);
            for impl_name in &provide.implementations {
                w.write_u2(pool.class_info(impl_name)?);
            }
        }

        Ok(())
    }
}

fn parse_export_list(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<ModuleExport>> {
    let count = reader.u2()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let package = cp.get_package_name(reader.u2()?)?;
        let flags = reader.u2()?;
        let to_count = reader.u2()? as usize;
        let mut to = Vec::with_capacity(to_count);
        for _ in 0..to_count {
            to.push(cp.get_module_name(reader.u2()?)?);
        }
        out.push(ModuleExport { package, flags, to });
    }
    Ok(out)
}

fn write_export_list(
    w: &mut Writer,
    pool: &mut ConstantPoolBuilder,
    exports: &[ModuleExport],
) -> Result<()> {
    w.write_u2(exports.len() as u16);
    for export in exports {
        w.write_u2(pool.package(&export.package)?);
        w.write_u2(export.flags);
        w.write_u2(export.to.len() as u16);
        for module in &export.to {
            w.write_u2(pool.module(module)?);
        }
    }
    Ok(())
}
