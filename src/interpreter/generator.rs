//! Generator objects and their resumption
//!
//! A generator body is a [`StateMachine`]: blocks that run to completion and
//! terminators that decide where to go next, possibly suspending. The driver below
//! is shared by both tiers; only running a block body differs (bytecode from the
//! block's offset, or the block's statements walked directly).
//!
//! Block-scoped bindings in a generator body live in function-level slots, so a
//! `for (let i ...)` loop inside a generator shares one `i` across iterations.
//! Closures captured per iteration therefore all see the final value: the same loop
//! pushing `() => i` yields `3,3,3` inside a generator but `0,1,2` in an ordinary
//! function.

use crate::error::JsError;
use crate::ir::{Body, FinallyTarget, Handler, SmBlock, StateMachine, Terminator};
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{CheapClone, JsValue};

use super::{Completion, Frame, Interpreter};

/// State of a generator object between resumptions
pub struct GeneratorObject {
    /// Taken out while the generator runs
    pub(crate) frame: Option<Box<Frame>>,
    pub(crate) state: GeneratorState,
    /// Pending completion of each `finally` region
    fin: Vec<Option<Pending>>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum GeneratorState {
    SuspendedStart,
    SuspendedYield {
        resume: usize,
        sent: u32,
        on_return: Option<FinallyTarget>,
        handler: Option<Handler>,
    },
    SuspendedDelegate(Delegation),
    Executing,
    Completed,
}

/// A `yield*` in progress
#[derive(Debug, Clone, Copy)]
pub(crate) struct Delegation {
    iterator: u32,
    resume: usize,
    result: u32,
    on_return: Option<FinallyTarget>,
    handler: Option<Handler>,
}

/// How a finally region was entered
enum Pending {
    Jump(usize),
    Return(JsValue),
    Throw(JsError),
}

/// What the caller of `next`/`throw`/`return` asked for
#[derive(Debug)]
pub enum ResumeMode {
    Next(JsValue),
    Throw(JsValue),
    Return(JsValue),
}

enum Step {
    Run(usize),
    Suspend(GeneratorState, JsValue),
    Finish(JsValue),
}

enum Outcome {
    Suspended(GeneratorState, JsValue),
    Finished(JsValue),
}

fn state_machine(frame: &Frame) -> Result<&StateMachine, JsError> {
    match &frame.template.body {
        Body::StateMachine(machine) => Ok(machine),
        Body::Statements(_) => Err(JsError::internal_error("generator without a state machine")),
    }
}

impl Interpreter {
    /// Calling a generator function: bind parameters, then create the suspended object
    pub(crate) fn start_generator(&mut self, mut frame: Frame, callee: &JsObjectRef) -> Result<JsValue, JsError> {
        match frame.template.chunk.get().cloned() {
            Some(chunk) => {
                self.run_chunk(&mut frame, &chunk, 0)?;
            }
            None => {
                let template = frame.template.cheap_clone();
                self.exec_block(&mut frame, &template.prologue)?;
            }
        }
        let prototype = match self.get_named(&JsValue::Object(callee.cheap_clone()), "prototype")? {
            JsValue::Object(p) => p,
            _ => frame.realm.intrinsics().generator_prototype.cheap_clone(),
        };
        let finally_count = state_machine(&frame)?.finally_count as usize;
        let generator = GeneratorObject {
            frame: Some(Box::new(frame)),
            state: GeneratorState::SuspendedStart,
            fin: std::iter::repeat_with(|| None).take(finally_count).collect(),
        };
        Ok(JsValue::Object(
            JsObject::new(Some(prototype), ObjectKind::Generator(Box::new(generator))).into_ref(),
        ))
    }

    /// `next`, `throw` and `return` of generator objects
    pub fn generator_resume(
        &mut self,
        generator: &JsValue,
        mode: ResumeMode,
        method: &str,
    ) -> Result<JsValue, JsError> {
        let incompatible = || {
            JsError::type_error(format!(
                "Generator.prototype.{} called on incompatible receiver",
                method
            ))
        };
        let obj = generator.as_object().ok_or_else(incompatible)?;
        let (frame, state, mut fin) = {
            let mut borrowed = obj.borrow_mut();
            let ObjectKind::Generator(g) = &mut borrowed.kind else {
                return Err(incompatible());
            };
            if matches!(g.state, GeneratorState::Executing) {
                return Err(JsError::type_error("Generator is already running"));
            }
            let state = std::mem::replace(&mut g.state, GeneratorState::Executing);
            (g.frame.take(), state, std::mem::take(&mut g.fin))
        };
        log::trace!("resume generator ({:?}) with {:?}", state, mode);

        let Some(mut frame) = frame else {
            self.store_generator(obj, None, GeneratorState::Completed, fin);
            return match mode {
                ResumeMode::Next(_) => Ok(self.create_generator_result(JsValue::Undefined, true)),
                ResumeMode::Return(value) => Ok(self.create_generator_result(value, true)),
                ResumeMode::Throw(value) => Err(self.throw_value(value)),
            };
        };
        let realm = frame.realm.cheap_clone();
        let outcome = self.with_realm(&realm, |interp| interp.drive(&mut frame, &mut fin, state, mode));
        match outcome {
            Ok(Outcome::Suspended(state, result)) => {
                self.store_generator(obj, Some(frame), state, fin);
                Ok(result)
            }
            Ok(Outcome::Finished(value)) => {
                self.store_generator(obj, None, GeneratorState::Completed, Vec::new());
                Ok(self.create_generator_result(value, true))
            }
            Err(err) => {
                self.store_generator(obj, None, GeneratorState::Completed, Vec::new());
                Err(err)
            }
        }
    }

    fn store_generator(
        &mut self,
        obj: &JsObjectRef,
        frame: Option<Box<Frame>>,
        state: GeneratorState,
        fin: Vec<Option<Pending>>,
    ) {
        if let ObjectKind::Generator(g) = &mut obj.borrow_mut().kind {
            g.frame = frame;
            g.state = state;
            g.fin = fin;
        }
    }

    fn drive(
        &mut self,
        frame: &mut Frame,
        fin: &mut [Option<Pending>],
        state: GeneratorState,
        mode: ResumeMode,
    ) -> Result<Outcome, JsError> {
        let step = match (state, mode) {
            (GeneratorState::SuspendedStart, ResumeMode::Next(_)) => Step::Run(0),
            (GeneratorState::SuspendedStart, ResumeMode::Return(value)) => Step::Finish(value),
            (GeneratorState::SuspendedStart, ResumeMode::Throw(value)) => {
                return Err(self.throw_value(value));
            }
            (GeneratorState::SuspendedYield { resume, sent, .. }, ResumeMode::Next(value)) => {
                frame.set_temp(sent, value);
                Step::Run(resume)
            }
            (GeneratorState::SuspendedYield { handler, .. }, ResumeMode::Throw(value)) => {
                let err = self.throw_value(value);
                Step::Run(self.route(frame, fin, handler, err)?)
            }
            (GeneratorState::SuspendedYield { on_return, .. }, ResumeMode::Return(value)) => {
                return_via(fin, on_return, value)
            }
            (GeneratorState::SuspendedDelegate(delegation), mode) => {
                match self.delegate(frame, fin, delegation, mode) {
                    Ok(step) => step,
                    Err(err) => Step::Run(self.route(frame, fin, delegation.handler, err)?),
                }
            }
            (GeneratorState::Executing | GeneratorState::Completed, _) => {
                return Err(JsError::internal_error("resumed a generator that is not suspended"));
            }
        };
        self.run_machine(frame, fin, step)
    }

    fn run_machine(
        &mut self,
        frame: &mut Frame,
        fin: &mut [Option<Pending>],
        mut step: Step,
    ) -> Result<Outcome, JsError> {
        let template = frame.template.cheap_clone();
        let Body::StateMachine(machine) = &template.body else {
            return Err(JsError::internal_error("generator without a state machine"));
        };
        loop {
            let pc = match step {
                Step::Run(pc) => pc,
                Step::Suspend(state, result) => return Ok(Outcome::Suspended(state, result)),
                Step::Finish(value) => return Ok(Outcome::Finished(value)),
            };
            self.check_interrupt()?;
            let block = machine
                .blocks
                .get(pc)
                .ok_or_else(|| JsError::internal_error(format!("no generator block {}", pc)))?;
            let result = match self.run_block(frame, pc, block) {
                Ok(()) => self.terminate(frame, fin, block),
                Err(err) => Err(err),
            };
            step = match result {
                Ok(next) => next,
                Err(err) => Step::Run(self.route(frame, fin, block.handler, err)?),
            };
        }
    }

    fn run_block(&mut self, frame: &mut Frame, index: usize, block: &SmBlock) -> Result<(), JsError> {
        match frame.template.chunk.get().cloned() {
            Some(chunk) => {
                let offset = chunk
                    .block_offsets
                    .get(index)
                    .copied()
                    .ok_or_else(|| JsError::internal_error("block without bytecode"))?;
                let entry_scope = frame.scope.cheap_clone();
                let result = self.run_chunk(frame, &chunk, offset);
                if result.is_err() {
                    frame.scope = entry_scope;
                }
                result.map(|_| ())
            }
            None => match self.exec_block(frame, &block.body)? {
                Completion::Normal => Ok(()),
                _ => Err(JsError::internal_error("abrupt completion inside a generator block")),
            },
        }
    }

    fn terminate(&mut self, frame: &mut Frame, fin: &mut [Option<Pending>], block: &SmBlock) -> Result<Step, JsError> {
        Ok(match &block.term {
            Terminator::Goto(target) => Step::Run(*target),
            Terminator::Branch {
                test,
                then,
                otherwise,
            } => {
                if frame.temp(*test).to_boolean() {
                    Step::Run(*then)
                } else {
                    Step::Run(*otherwise)
                }
            }
            Terminator::Yield {
                value,
                resume,
                sent,
                on_return,
            } => {
                let result = self.create_generator_result(frame.temp(*value), false);
                Step::Suspend(
                    GeneratorState::SuspendedYield {
                        resume: *resume,
                        sent: *sent,
                        on_return: *on_return,
                        handler: block.handler,
                    },
                    result,
                )
            }
            Terminator::YieldDelegate {
                iterator,
                resume,
                result,
                on_return,
            } => {
                let delegation = Delegation {
                    iterator: *iterator,
                    resume: *resume,
                    result: *result,
                    on_return: *on_return,
                    handler: block.handler,
                };
                self.delegate(frame, fin, delegation, ResumeMode::Next(JsValue::Undefined))?
            }
            Terminator::Return { value, via } => return_via(fin, *via, frame.temp(*value)),
            Terminator::Throw(temp) => return Err(self.throw_value(frame.temp(*temp))),
            Terminator::EnterFinally { finally, then } => {
                set_pending(fin, finally.fin, Pending::Jump(*then));
                Step::Run(finally.block)
            }
            Terminator::EndFinally { fin: index, outer } => {
                let pending = fin.get_mut(*index as usize).and_then(Option::take);
                match pending {
                    Some(Pending::Jump(target)) => Step::Run(target),
                    Some(Pending::Return(value)) => return_via(fin, *outer, value),
                    Some(Pending::Throw(err)) => return Err(err),
                    None => return Err(JsError::internal_error("finally block without a pending completion")),
                }
            }
        })
    }

    /// One step of `yield*`: forward `mode` to the inner iterator
    fn delegate(
        &mut self,
        frame: &mut Frame,
        fin: &mut [Option<Pending>],
        delegation: Delegation,
        mode: ResumeMode,
    ) -> Result<Step, JsError> {
        let record = frame.temp(delegation.iterator);
        let (iterator, next) = match record.as_object().map(|r| match &r.borrow().kind {
            ObjectKind::IteratorRecord { iterator, next, .. } => Some((iterator.cheap_clone(), next.cheap_clone())),
            _ => None,
        }) {
            Some(Some(parts)) => parts,
            _ => return Err(JsError::internal_error("yield* without an iterator record")),
        };
        let result = match mode {
            ResumeMode::Next(value) => self.call_function(&next, iterator, &[value])?,
            ResumeMode::Throw(value) => {
                let throw_key = self.key("throw");
                match self.get_method(&iterator, &throw_key)? {
                    Some(method) => self.call_function(&method, iterator, &[value])?,
                    None => {
                        self.iterator_close(&record)?;
                        return Err(JsError::type_error(
                            "The iterator does not provide a 'throw' method",
                        ));
                    }
                }
            }
            ResumeMode::Return(value) => {
                let return_key = self.key("return");
                match self.get_method(&iterator, &return_key)? {
                    Some(method) => {
                        let result = self.call_function(&method, iterator, &[value])?;
                        self.expect_iterator_result(&result)?;
                        if self.get_named(&result, "done")?.to_boolean() {
                            let value = self.get_named(&result, "value")?;
                            return Ok(return_via(fin, delegation.on_return, value));
                        }
                        return Ok(Step::Suspend(GeneratorState::SuspendedDelegate(delegation), result));
                    }
                    None => return Ok(return_via(fin, delegation.on_return, value)),
                }
            }
        };
        self.expect_iterator_result(&result)?;
        if self.get_named(&result, "done")?.to_boolean() {
            let value = self.get_named(&result, "value")?;
            frame.set_temp(delegation.result, value);
            Ok(Step::Run(delegation.resume))
        } else {
            Ok(Step::Suspend(GeneratorState::SuspendedDelegate(delegation), result))
        }
    }

    fn expect_iterator_result(&self, result: &JsValue) -> Result<(), JsError> {
        if result.is_object() {
            Ok(())
        } else {
            Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                self.display_value(result)
            )))
        }
    }

    /// Send an exception to the handler of the block it was raised in
    fn route(
        &mut self,
        frame: &mut Frame,
        fin: &mut [Option<Pending>],
        handler: Option<Handler>,
        err: JsError,
    ) -> Result<usize, JsError> {
        if !err.is_catchable() {
            return Err(err);
        }
        match handler {
            Some(Handler::Catch { target, temp }) => {
                let value = self.error_to_value(err);
                frame.set_temp(temp, value);
                Ok(target)
            }
            Some(Handler::Finally(finally)) => {
                set_pending(fin, finally.fin, Pending::Throw(err));
                Ok(finally.block)
            }
            None => Err(err),
        }
    }
}

fn set_pending(fin: &mut [Option<Pending>], index: u32, pending: Pending) {
    if let Some(slot) = fin.get_mut(index as usize) {
        *slot = Some(pending);
    }
}

/// Return, running the enclosing finally region first when there is one
fn return_via(fin: &mut [Option<Pending>], via: Option<FinallyTarget>, value: JsValue) -> Step {
    match via {
        Some(finally) => {
            set_pending(fin, finally.fin, Pending::Return(value));
            Step::Run(finally.block)
        }
        None => Step::Finish(value),
    }
}
