//! Schema validation of the assembled object graph, rooted at the
//! document catalog.

use std::collections::HashSet;

use log::warn;

use crate::config::ValidationMode;
use crate::context::Context;
use crate::error::{Error, Result, ValidationError};
use crate::object::{Dictionary, Object, ObjectId};

/// Check the graph under the context's validation policy.
///
/// Strict stops at the first uncorrectable finding. Relaxed collects
/// findings, repairs the common ones in memory and reports what it saw.
/// None does nothing.
pub fn validate(ctx: &mut Context) -> Result<Vec<ValidationError>> {
    if ctx.config.validation_mode == ValidationMode::None {
        return Ok(Vec::new());
    }
    let mut walker = Walker {
        errors: Vec::new(),
        strict: ctx.config.strict(),
    };
    walker.document(ctx)?;
    Ok(walker.errors)
}

struct Walker {
    errors: Vec<ValidationError>,
    strict: bool,
}

impl Walker {
    fn report(&mut self, error: ValidationError) -> Result<()> {
        if self.strict {
            return Err(error.into());
        }
        warn!("validation: {error}");
        self.errors.push(error);
        Ok(())
    }

    fn document(&mut self, ctx: &mut Context) -> Result<()> {
        if !ctx.trailer.has(b"Root") {
            return Err(ValidationError::MissingRoot.into());
        }
        let root_ref = ctx.trailer.get(b"Root")?.clone();
        let catalog = match ctx.resolve(&root_ref) {
            Ok(Object::Dictionary(dict)) => dict,
            Ok(_) | Err(_) => return Err(ValidationError::InvalidCatalog.into()),
        };

        if !catalog.has_type(b"Catalog") {
            self.report(ValidationError::WrongType {
                dict: "Catalog",
                key: "Type",
            })?;
            // Repair: the object the trailer points at is the catalog.
            if let Ok(id) = root_ref.as_reference() {
                if let Ok(object) = ctx.get_object_mut(id) {
                    if let Ok(dict) = object.as_dict_mut() {
                        dict.set("Type", "Catalog");
                    }
                }
            }
        }

        for key in ["Names", "AcroForm", "Outlines"] {
            self.optional_dict(ctx, &catalog, "Catalog", key)?;
        }
        if let Ok(metadata) = catalog.get(b"Metadata") {
            let metadata = metadata.clone();
            if !matches!(ctx.resolve(&metadata), Ok(Object::Stream(_))) {
                self.report(ValidationError::WrongType {
                    dict: "Catalog",
                    key: "Metadata",
                })?;
            }
        }
        if let Ok(info) = ctx.trailer.get(b"Info").cloned() {
            if !matches!(ctx.resolve(&info), Ok(Object::Dictionary(_))) {
                self.report(ValidationError::WrongType {
                    dict: "trailer",
                    key: "Info",
                })?;
            }
        }

        let Ok(pages_ref) = catalog.get(b"Pages") else {
            return self.report(ValidationError::MissingEntry {
                dict: "Catalog",
                key: "Pages",
            });
        };
        let pages_ref = pages_ref.clone();
        let pages_id = pages_ref.as_reference().ok();
        let pages = match ctx.resolve(&pages_ref) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => {
                return self.report(ValidationError::WrongType {
                    dict: "Catalog",
                    key: "Pages",
                });
            }
        };
        if !pages.has_type(b"Pages") {
            self.report(ValidationError::WrongType {
                dict: "Pages",
                key: "Type",
            })?;
        }

        let mut visited = HashSet::new();
        let counted = self.page_tree(ctx, &pages, &mut visited)?;
        let declared = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(-1);
        if declared != counted {
            self.report(ValidationError::PageCount {
                found: declared,
                counted,
            })?;
            // Repair the count in memory.
            if let Some(id) = pages_id {
                if let Ok(object) = ctx.get_object_mut(id) {
                    if let Ok(dict) = object.as_dict_mut() {
                        dict.set("Count", counted);
                    }
                }
            }
        }
        Ok(())
    }

    /// Count leaf pages below one Pages node.
    fn page_tree(
        &mut self,
        ctx: &mut Context,
        node: &Dictionary,
        visited: &mut HashSet<ObjectId>,
    ) -> Result<i64> {
        let Ok(kids) = node.get(b"Kids") else {
            return self.report(ValidationError::MissingEntry {
                dict: "Pages",
                key: "Kids",
            })
            .map(|_| 0);
        };
        let kids = match ctx.resolve(kids) {
            Ok(Object::Array(kids)) => kids,
            _ => {
                self.report(ValidationError::WrongType {
                    dict: "Pages",
                    key: "Kids",
                })?;
                return Ok(0);
            }
        };

        let mut count = 0i64;
        for kid in kids {
            let kid_id = kid.as_reference().ok();
            if let Some(id) = kid_id {
                if !visited.insert(id) {
                    self.report(ValidationError::InvalidPageTree)?;
                    continue;
                }
            }
            let child = match ctx.resolve(&kid) {
                Ok(Object::Dictionary(dict)) => dict,
                _ => {
                    self.report(ValidationError::InvalidPageTree)?;
                    continue;
                }
            };
            if child.has_type(b"Pages") {
                count += self.page_tree(ctx, &child, visited)?;
            } else {
                if !child.has_type(b"Page") {
                    self.report(ValidationError::WrongType {
                        dict: "Page",
                        key: "Type",
                    })?;
                    // Repair: a leaf of the page tree is a page.
                    if let Some(id) = kid_id {
                        if let Ok(object) = ctx.get_object_mut(id) {
                            if let Ok(dict) = object.as_dict_mut() {
                                dict.set("Type", "Page");
                            }
                        }
                    }
                }
                if !child.has(b"Parent") {
                    self.report(ValidationError::MissingEntry {
                        dict: "Page",
                        key: "Parent",
                    })?;
                }
                count += 1;
            }
        }
        Ok(count)
    }

    /// An optional entry that, when present, must resolve to a
    /// dictionary.
    fn optional_dict(
        &mut self,
        ctx: &mut Context,
        dict: &Dictionary,
        dict_name: &'static str,
        key: &'static str,
    ) -> Result<()> {
        let Ok(value) = dict.get(key.as_bytes()) else {
            return Ok(());
        };
        let value = value.clone();
        if !matches!(ctx.resolve(&value), Ok(Object::Dictionary(_))) {
            self.report(ValidationError::WrongType {
                dict: dict_name,
                key,
            })?;
        }
        Ok(())
    }
}
