use std::cell::RefCell;
use std::rc::Rc;

use ecow::EcoString;
use hashbrown::HashMap;

use crate::values::Value;

/// Shared handle to an environment. Function values keep a handle to
/// the environment they were created in, which is how closures capture.
pub type Env<'a> = Rc<RefCell<Environment<'a>>>;

/// Name bindings for the tree-walking engine. Environments chain: a
/// lookup that misses walks outward to the enclosing environment.
#[derive(Default)]
pub struct Environment<'a> {
    store: HashMap<EcoString, Value<'a>>,
    outer: Option<Env<'a>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Env<'a> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn enclosed(outer: Env<'a>) -> Env<'a> {
        Rc::new(RefCell::new(Self {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Value<'a>> {
        if let Some(value) = self.store.get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.borrow().get(name))
    }

    pub fn set(&mut self, name: &str, value: Value<'a>) {
        self.store.insert(name.into(), value);
    }
}
