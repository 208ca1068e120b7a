//! Lexical scope chain
//!
//! An [`Environment`] is a handle to one frame of bindings plus a link to its
//! parent frame. Handles are cheap to clone and share the frame they point to, so
//! a closure that captures its defining environment keeps that frame alive for as
//! long as the closure itself is reachable.
//!
//! A closure stored in the frame it captured is a reference cycle. Every frame
//! created under a root is therefore recorded in that root's [`FrameSet`], and
//! [`Environment::release`] empties all of them when the owner is done.

use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// Live frames are pruned from a [`FrameSet`] whenever it grows past a multiple of this
const PRUNE_EVERY: usize = 256;

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    constants: HashSet<String>,
    parent: Option<Environment>,
}

/// Weak handles to every frame descended from one root
#[derive(Default)]
struct FrameSet {
    frames: RefCell<Vec<Weak<RefCell<Frame>>>>,
}

impl FrameSet {
    fn track(&self, frame: &Rc<RefCell<Frame>>) {
        let mut frames = self.frames.borrow_mut();
        if frames.len() % PRUNE_EVERY == PRUNE_EVERY - 1 {
            frames.retain(|weak| weak.strong_count() > 0);
        }
        frames.push(Rc::downgrade(frame));
    }
}

/// Shared handle to a scope frame
#[derive(Clone)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
    frames: Rc<FrameSet>,
}

/// Non-owning handle to a frame, see [`Environment::downgrade`]
#[derive(Clone)]
pub struct WeakEnvironment {
    frame: Weak<RefCell<Frame>>,
    frames: Weak<FrameSet>,
}

impl WeakEnvironment {
    pub fn upgrade(&self) -> Option<Environment> {
        Some(Environment {
            frame: self.frame.upgrade()?,
            frames: self.frames.upgrade()?,
        })
    }
}

impl Default for Environment {
    fn default() -> Self {
        let frames = Rc::new(FrameSet::default());
        let frame = Rc::new(RefCell::new(Frame::default()));
        frames.track(&frame);
        Self { frame, frames }
    }
}

impl Environment {
    /// A root frame with no parent
    pub fn new() -> Self {
        Self::default()
    }

    /// A new, empty frame whose parent is `self`
    pub fn child(&self) -> Self {
        let frame = Rc::new(RefCell::new(Frame {
            parent: Some(self.clone()),
            ..Frame::default()
        }));
        self.frames.track(&frame);
        Self {
            frame,
            frames: Rc::clone(&self.frames),
        }
    }

    pub fn parent(&self) -> Option<Environment> {
        self.frame.borrow().parent.clone()
    }

    /// Bind `name` in this frame, replacing any binding it already has here
    pub fn define(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut frame = self.frame.borrow_mut();
        frame.constants.remove(&name);
        frame.bindings.insert(name, value);
    }

    /// Bind `name` in this frame and refuse later reassignment through [`Environment::set`]
    pub fn define_constant(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut frame = self.frame.borrow_mut();
        frame.constants.insert(name.clone());
        frame.bindings.insert(name, value);
    }

    /// Innermost binding of `name`
    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        self.lookup(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    /// Innermost binding of `name`, if any
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let frame = env.frame.borrow();
            if let Some(value) = frame.bindings.get(name) {
                return Some(value.clone());
            }
            current = frame.parent.clone();
        }
        None
    }

    pub fn has(&self, name: &str) -> bool {
        self.frame_of(name).is_some()
    }

    /// Whether the innermost binding of `name` is a constant
    pub fn is_constant(&self, name: &str) -> bool {
        self.frame_of(name)
            .is_some_and(|env| env.frame.borrow().constants.contains(name))
    }

    /// Replace the innermost existing binding of `name`
    pub fn set(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let env = self
            .frame_of(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?;
        let mut frame = env.frame.borrow_mut();
        if frame.constants.contains(name) {
            return Err(RuntimeError::ConstantReassignment(name.to_string()));
        }
        frame.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Replace the innermost existing binding of `name`, or define it in this frame
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.has(name) {
            self.set(name, value)
        } else {
            self.define(name, value);
            Ok(())
        }
    }

    /// Bindings of this frame only, sorted by name
    pub fn get_all(&self) -> Vec<(String, Value)> {
        let frame = self.frame.borrow();
        let mut bindings: Vec<(String, Value)> = frame
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }

    /// Remove every binding from this frame
    pub fn clear(&self) {
        let mut frame = self.frame.borrow_mut();
        frame.bindings.clear();
        frame.constants.clear();
    }

    /// Number of frames from here to the root, counting this one
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = Some(self.clone());
        while let Some(env) = current {
            depth += 1;
            current = env.parent();
        }
        depth
    }

    /// Empty every frame that shares this frame's root, this one included.
    ///
    /// Handles stay usable afterwards but see no bindings. Values are dropped
    /// after the frames are unborrowed, since dropping a closure may release
    /// further frames.
    pub fn release(&self) {
        let frames = std::mem::take(&mut *self.frames.frames.borrow_mut());
        let mut dropped = Vec::new();
        for weak in frames {
            let Some(shared) = weak.upgrade() else {
                continue;
            };
            let mut frame = shared.borrow_mut();
            dropped.extend(frame.bindings.drain().map(|(_, value)| value));
            frame.constants.clear();
        }
        drop(dropped);
        self.frames.track(&self.frame);
    }

    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment {
            frame: Rc::downgrade(&self.frame),
            frames: Rc::downgrade(&self.frames),
        }
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    fn frame_of(&self, name: &str) -> Option<Environment> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if env.frame.borrow().bindings.contains_key(name) {
                return Some(env);
            }
            current = env.parent();
        }
        None
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.frame.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("depth", &self.depth())
            .finish()
    }
}
