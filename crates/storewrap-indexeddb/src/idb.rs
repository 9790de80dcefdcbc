//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`.

use js_sys::Promise;
use std::cell::RefCell;
use std::rc::Rc;
use storewrap_core::engine::{EngineResult, UpgradeFn, UpgradeTarget};
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbRequest, IdbTransaction};

use crate::error::{js_message, IndexedDbError, Result};

/// Type alias for the pair of closures kept alive until one of them fires
type ClosurePair = (
    Closure<dyn FnMut(web_sys::Event)>,
    Closure<dyn FnMut(web_sys::Event)>,
);

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
/// Rejects with the request's `DomException` so callers can read its name.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
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

        // Store both closures to keep them alive until one fires
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
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_e
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction aborted"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_error.set_onabort(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error));
    })
}

/// Schema handle given to the upgrade callback.
struct UpgradeDatabase {
    db: IdbDatabase,
}

impl UpgradeTarget for UpgradeDatabase {
    fn has_store(&self, name: &str) -> bool {
        self.db.object_store_names().contains(name)
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> EngineResult<()> {
        let params = web_sys::IdbObjectStoreParameters::new();
        js_sys::Reflect::set(&params, &"keyPath".into(), &key_path.into())
            .map_err(|e| IndexedDbError::Upgrade(js_message(&e)))?;

        self.db
            .create_object_store_with_optional_parameters(name, &params)
            .map_err(IndexedDbError::request)?;
        Ok(())
    }
}

/// Resolve the database handle carried by an upgrade event.
fn upgrade_database(event: &web_sys::IdbVersionChangeEvent) -> Result<IdbDatabase> {
    let req: IdbOpenDbRequest = event
        .target()
        .ok_or_else(|| IndexedDbError::Upgrade("upgrade event has no target".into()))?
        .dyn_into()
        .map_err(|_| IndexedDbError::Upgrade("upgrade target is not an open request".into()))?;
    req.result()
        .map_err(|e| IndexedDbError::Upgrade(js_message(&e)))?
        .dyn_into()
        .map_err(|_| IndexedDbError::Upgrade("upgrade result is not IdbDatabase".into()))
}

/// Open (or create) a database, running `on_upgrade` inside `upgradeneeded`.
///
/// A failing upgrade aborts the versionchange transaction, so the database is
/// left as it was, and its error is returned instead of the resulting abort.
pub async fn open_database(
    db_name: &str,
    version: Option<u32>,
    mut on_upgrade: Box<UpgradeFn>,
) -> Result<IdbDatabase> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = match version {
        Some(v) => factory.open_with_u32(db_name, v),
        None => factory.open(db_name),
    }
    .map_err(IndexedDbError::open)?;

    let upgrade_failure: Rc<RefCell<Option<IndexedDbError>>> = Rc::new(RefCell::new(None));
    let failure = upgrade_failure.clone();

    let name = db_name.to_string();
    let on_upgrade_event = Closure::wrap(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
        debug!(db = %name, old = event.old_version(), "upgrade needed");
        let outcome = upgrade_database(&event).and_then(|db| {
            let mut target = UpgradeDatabase { db };
            on_upgrade(&mut target).map_err(|e| IndexedDbError::Upgrade(e.to_string()))
        });

        if let Err(e) = outcome {
            if let Some(tx) = event
                .target()
                .and_then(|t| t.dyn_into::<IdbOpenDbRequest>().ok())
                .and_then(|req| req.transaction())
            {
                let _ = tx.abort();
            }
            *failure.borrow_mut() = Some(e);
        }
    }) as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade_event.as_ref().unchecked_ref()));

    let open_promise = request_to_promise(open_req.unchecked_ref());
    let result = wasm_bindgen_futures::JsFuture::from(open_promise).await;

    // Open has settled; the upgrade closure can go
    open_req.set_onupgradeneeded(None);
    drop(on_upgrade_event);

    if let Some(err) = upgrade_failure.borrow_mut().take() {
        if let Ok(db) = result.as_ref().map(|v| v.clone().unchecked_into::<IdbDatabase>()) {
            db.close();
        }
        return Err(err);
    }

    result
        .map_err(IndexedDbError::open)?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::request)
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let promise = transaction_to_promise(tx);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::transaction)?;
    Ok(())
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", js_message(&e))))?;
    let promise = request_to_promise(req.unchecked_ref());
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", js_message(&e))))?;
    Ok(())
}
