//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`.
//!
//! Request and transaction futures attach their event handlers when they are
//! created, so a future must be created right after issuing its request, not
//! after awaiting an earlier one.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Promise;
use objstore_core::schema::{DatabaseModel, StoreSchema};
use tracing::{debug, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    DomException, IdbDatabase, IdbFactory, IdbObjectStore, IdbOpenDbRequest, IdbRequest,
    IdbTransaction, IdbTransactionMode,
};

use crate::error::{js_error_message, IndexedDbError, Result};

/// Type alias for upgrade closure to reduce complexity
type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(web_sys::IdbVersionChangeEvent)>>>>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's result.
///
/// Rejects with the request's `DOMException` so callers can tell constraint
/// errors apart.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        type ClosurePair = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = req_e
                .error()
                .ok()
                .flatten()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("unknown IDB error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both closures alive until one fires
        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction completion into a JS Promise.
///
/// Rejects on `error` and on `abort`.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx_complete = tx.clone();
    let tx_error = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        type ClosureTriple = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosureTriple>>> = Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx_error.clone();
        let reject_on_error = reject.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_e
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction error"));
            let _ = reject_on_error.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let closures_for_abort = closures.clone();
        let on_abort = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = reject.call1(&JsValue::UNDEFINED, &JsValue::from_str("transaction aborted"));
            *closures_for_abort.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_complete.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_complete.set_onabort(Some(on_abort.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error, on_abort));
    })
}

/// Create the stores and indexes of `model` that the database lacks.
///
/// Runs inside `onupgradeneeded`; existing stores and indexes are left as they are.
fn apply_model(db: &IdbDatabase, upgrade_tx: Option<IdbTransaction>, model: &DatabaseModel) -> Result<()> {
    for schema in &model.stores {
        let store = if db.object_store_names().contains(&schema.name) {
            let tx = upgrade_tx
                .as_ref()
                .ok_or_else(|| IndexedDbError::Open("upgrade has no transaction".into()))?;
            tx.object_store(&schema.name)
                .map_err(|e| IndexedDbError::Open(js_error_message(&e)))?
        } else {
            create_store(db, schema)?
        };
        create_missing_indexes(&store, schema)?;
    }
    Ok(())
}

fn create_store(db: &IdbDatabase, schema: &StoreSchema) -> Result<IdbObjectStore> {
    let params = web_sys::IdbObjectStoreParameters::new();
    js_sys::Reflect::set(&params, &"keyPath".into(), &schema.key_path.as_str().into())
        .map_err(|e| IndexedDbError::Open(js_error_message(&e)))?;
    js_sys::Reflect::set(
        &params,
        &"autoIncrement".into(),
        &JsValue::from_bool(schema.auto_increment),
    )
    .map_err(|e| IndexedDbError::Open(js_error_message(&e)))?;

    debug!("Creating object store '{}'", schema.name);
    db.create_object_store_with_optional_parameters(&schema.name, &params)
        .map_err(|e| IndexedDbError::Open(format!("create store {}: {}", schema.name, js_error_message(&e))))
}

fn create_missing_indexes(store: &IdbObjectStore, schema: &StoreSchema) -> Result<()> {
    let existing = store.index_names();
    for index in &schema.indexes {
        if existing.contains(&index.name) {
            continue;
        }

        let params = web_sys::IdbIndexParameters::new();
        js_sys::Reflect::set(&params, &"unique".into(), &JsValue::from_bool(index.unique))
            .map_err(|e| IndexedDbError::Open(js_error_message(&e)))?;
        js_sys::Reflect::set(
            &params,
            &"multiEntry".into(),
            &JsValue::from_bool(index.multi_entry),
        )
        .map_err(|e| IndexedDbError::Open(js_error_message(&e)))?;

        debug!("Creating index '{}' on '{}'", index.name, schema.name);
        store
            .create_index_with_str_and_optional_parameters(&index.name, &index.key_path, &params)
            .map_err(|e| {
                IndexedDbError::Open(format!(
                    "create index {}.{}: {}",
                    schema.name,
                    index.name,
                    js_error_message(&e)
                ))
            })?;
    }
    Ok(())
}

/// Open (or create/upgrade) the database described by `model`.
pub async fn open_database(model: &DatabaseModel) -> Result<IdbDatabase> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(&model.name, model.version)
        .map_err(|e| IndexedDbError::Open(js_error_message(&e)))?;

    // Errors raised inside the upgrade callback surface after the open completes
    let upgrade_error: Rc<RefCell<Option<IndexedDbError>>> = Rc::new(RefCell::new(None));
    let upgrade_error_slot = upgrade_error.clone();

    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let upgrade_closure_for_drop = upgrade_closure.clone();

    let upgrade_model = model.clone();
    let upgrade_req = open_req.clone();
    let on_upgrade = Closure::wrap(Box::new(move |_event: web_sys::IdbVersionChangeEvent| {
        let outcome = upgrade_req
            .result()
            .map_err(|e| IndexedDbError::Open(js_error_message(&e)))
            .and_then(|db| {
                let db: IdbDatabase = db.unchecked_into();
                apply_model(&db, upgrade_req.transaction(), &upgrade_model)
            });
        if let Err(err) = outcome {
            if let Some(tx) = upgrade_req.transaction() {
                let _ = tx.abort();
            }
            *upgrade_error_slot.borrow_mut() = Some(err);
        }
    }) as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
    *upgrade_closure.borrow_mut() = Some(on_upgrade);

    let open_promise = request_to_promise(open_req.unchecked_ref());
    let result = JsFuture::from(open_promise).await;

    *upgrade_closure_for_drop.borrow_mut() = None;

    if let Some(err) = upgrade_error.borrow_mut().take() {
        return Err(err);
    }
    let result = result.map_err(|e| IndexedDbError::Open(js_error_message(&e)))?;

    info!("Opened IndexedDB '{}' v{}", model.name, model.version);

    result
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))
}

/// Start a transaction on one object store.
pub fn begin_transaction(
    db: &IdbDatabase,
    store_name: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(store_name, mode)
        .map_err(|e| IndexedDbError::Transaction(js_error_message(&e)))?;
    let store = tx
        .object_store(store_name)
        .map_err(|e| IndexedDbError::Request(js_error_message(&e)))?;
    Ok((tx, store))
}

/// Future resolving to a request's result. Create it right after issuing the request.
pub fn request_future(req: &IdbRequest) -> JsFuture {
    JsFuture::from(request_to_promise(req))
}

/// Future resolving when a transaction completes. Create it right after beginning it.
pub fn transaction_future(tx: &IdbTransaction) -> JsFuture {
    JsFuture::from(transaction_to_promise(tx))
}

/// Await a request future, classifying its failure.
pub async fn settle_request(fut: JsFuture) -> Result<JsValue> {
    fut.await.map_err(|e| {
        let msg = js_error_message(&e);
        match e.dyn_ref::<DomException>() {
            Some(exception) if exception.name() == "ConstraintError" => {
                IndexedDbError::Constraint(msg)
            }
            _ => IndexedDbError::Request(msg),
        }
    })
}

/// Await a transaction future.
pub async fn settle_transaction(fut: JsFuture) -> Result<()> {
    fut.await
        .map_err(|e| IndexedDbError::Transaction(js_error_message(&e)))?;
    Ok(())
}

/// Close the connection.
pub fn close_database(db: &IdbDatabase) {
    db.close();
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", js_error_message(&e))))?;
    JsFuture::from(request_to_promise(req.unchecked_ref()))
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", js_error_message(&e))))?;
    Ok(())
}
