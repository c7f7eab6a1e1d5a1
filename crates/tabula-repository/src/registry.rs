//! Process-wide descriptor cache.

use crate::entity::Entity;
use crate::metadata::EntityDescriptor;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::LazyLock;
use tabula_core::{require_text, DaoError, DaoResult};
use tracing::debug;

type Descriptor = &'static (dyn Any + Send + Sync);

#[derive(Default)]
struct Slot {
    table_override: Option<String>,
    descriptor: Option<Descriptor>,
}

static REGISTRY: LazyLock<RwLock<HashMap<TypeId, Slot>>> = LazyLock::new(Default::default);

/// Returns the descriptor for `E`, building it on first use.
///
/// Cached descriptors are read under a shared lock, so lookups never wait
/// on each other. The first build takes the write lock and checks the slot
/// again, so concurrent first calls all observe the same instance.
/// Descriptors live for the rest of the process.
///
/// # Errors
///
/// Returns [`DaoError::Mapping`] when `E` cannot be mapped. Failures are
/// not cached.
pub fn resolve<E: Entity>() -> DaoResult<&'static EntityDescriptor<E>> {
    let cached = REGISTRY
        .read_recursive()
        .get(&TypeId::of::<E>())
        .and_then(|slot| slot.descriptor);

    let descriptor = match cached {
        Some(descriptor) => descriptor,
        None => register::<E>()?,
    };

    descriptor.downcast_ref::<EntityDescriptor<E>>().ok_or_else(|| {
        DaoError::mapping(format!("descriptor registered for {} has the wrong type", E::TYPE_NAME))
    })
}

fn register<E: Entity>() -> DaoResult<Descriptor> {
    let mut registry = REGISTRY.write();
    let slot = registry.entry(TypeId::of::<E>()).or_default();
    if let Some(descriptor) = slot.descriptor {
        return Ok(descriptor);
    }

    let built = EntityDescriptor::<E>::build(slot.table_override.as_deref())?;
    debug!(
        entity = E::TYPE_NAME,
        table = built.table_name(),
        "Registered entity descriptor"
    );
    let leaked: Descriptor = Box::leak(Box::new(built));
    slot.descriptor = Some(leaked);
    Ok(leaked)
}

/// Overrides the table name of `E`.
///
/// Must be called at most once per type, before `E` is first resolved.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for a blank name, a second
/// override, or an override after resolution.
pub fn set_table_name<E: Entity>(table_name: &str) -> DaoResult<()> {
    let table_name = require_text(table_name, "table_name")?;

    let mut registry = REGISTRY.write();
    let slot = registry.entry(TypeId::of::<E>()).or_default();

    if slot.descriptor.is_some() {
        return Err(DaoError::invalid_argument(format!(
            "table name for {} must be set before its first use",
            E::TYPE_NAME
        )));
    }
    if let Some(existing) = &slot.table_override {
        return Err(DaoError::invalid_argument(format!(
            "table name for {} is already set to {existing}",
            E::TYPE_NAME
        )));
    }

    slot.table_override = Some(table_name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Field;

    macro_rules! entity {
        ($name:ident, $type_name:literal) => {
            #[derive(Debug, Default)]
            struct $name {
                id: String,
                label: String,
            }

            impl Entity for $name {
                type Id = String;
                const TYPE_NAME: &'static str = $type_name;

                fn fields() -> Vec<Field<Self>> {
                    vec![
                        Field::new("id", |e: &Self| &e.id, |e: &mut Self, v| e.id = v),
                        Field::new("label", |e: &Self| &e.label, |e: &mut Self, v| e.label = v),
                    ]
                }

                fn id(&self) -> Option<&String> {
                    Some(&self.id)
                }
            }
        };
    }

    entity!(Shelf, "Shelf");
    entity!(Carton, "Carton");
    entity!(Pallet, "Pallet");
    entity!(Bin, "Bin");

    #[test]
    fn test_resolve_is_idempotent() {
        let first = resolve::<Shelf>().unwrap();
        let second = resolve::<Shelf>().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.table_name(), "shelf");
    }

    #[test]
    fn test_override_before_first_use() {
        set_table_name::<Carton>("cartons").unwrap();
        let descriptor = resolve::<Carton>().unwrap();
        assert_eq!(descriptor.table_name(), "cartons");
        assert_eq!(descriptor.id_column(), "carton_id");
    }

    #[test]
    fn test_override_rejected_after_resolution() {
        resolve::<Pallet>().unwrap();
        let err = set_table_name::<Pallet>("pallets").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        assert_eq!(resolve::<Pallet>().unwrap().table_name(), "pallet");
    }

    #[test]
    fn test_override_rejected_twice_or_blank() {
        assert!(set_table_name::<Bin>("  ").is_err());
        set_table_name::<Bin>("bins").unwrap();
        assert!(set_table_name::<Bin>("bins_v2").is_err());
    }

    #[test]
    fn test_cached_lookup_shares_the_lock() {
        entity!(Drawer, "Drawer");
        let first = resolve::<Drawer>().unwrap();

        let held = REGISTRY.read_recursive();
        let again = std::thread::scope(|scope| {
            scope
                .spawn(|| resolve::<Drawer>().unwrap() as *const _ as usize)
                .join()
                .unwrap()
        });
        drop(held);

        assert_eq!(again, first as *const _ as usize);
    }

    #[test]
    fn test_concurrent_first_access_converges() {
        entity!(Tote, "Tote");

        let addresses: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| resolve::<Tote>().unwrap() as *const _ as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(resolve::<Tote>().unwrap().columns().len(), 2);
    }
}
