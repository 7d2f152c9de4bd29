//! Sequential construction of programs.
//!
//! [`program!`](crate::program!) lets a program be written as straight-line
//! steps. Every step is a suspension point: the expansion is the nested
//! [`Program::chain`](crate::Program::chain) calls one would write by hand, so
//! nothing runs until the program is interpreted and each bound name holds
//! exactly what the handler answered for that step.
//!
//! | statement              | meaning                                      |
//! |------------------------|----------------------------------------------|
//! | `name <= program;`     | run `program`, bind its result to `name`     |
//! | `let pattern = expr;`  | bind a pure value                            |
//! | `let name: T = expr;`  | bind a pure value of type `T`                |
//! | `program;`             | run `program`, discard its result            |
//! | `return expr;`         | finish with `expr`                           |
//! | `program` (last, no `;`) | finish with that program's result          |
//!
//! A block that ends any other way finishes with `()`.
//!
//! ```ignore
//! let program = program! {
//!     k <= Store::get("k".into());
//!     Store::put("l".into(), format!("{k}!!"));
//!     l <= Store::get("l".into());
//!     return l;
//! };
//! ```
//!
//! Later steps live inside `Fn` continuations that may run once per
//! interpretation, so names bound with `<=` or `let name = ...` are cloned
//! into every later step and stay usable by value anywhere below their
//! binding. Those values must be `Clone + Send + Sync + 'static`, and a `let`
//! that moves one (`let s = k;`) should clone it instead. Names bound
//! through other `let` patterns, and values captured from outside the block,
//! are moved into the next step only; clone them there if they are needed
//! further down.

/// Build a [`Program`](crate::Program) from sequential steps.
///
/// See the [module documentation](crate::builder) for the statement forms.
#[macro_export]
macro_rules! program {
    (@bound [$($bound:ident)*]) => {
        $crate::Program::of(())
    };

    (@bound [$($bound:ident)*] return $value:expr $(;)?) => {
        $crate::Program::of($value)
    };

    (@bound [$($bound:ident)*] let $name:ident = $value:expr; $($rest:tt)*) => {{
        let $name = $value;
        $crate::program!(@bound [$($bound)* $name] $($rest)*)
    }};

    (@bound [$($bound:ident)*] let $name:ident : $ty:ty = $value:expr; $($rest:tt)*) => {{
        let $name: $ty = $value;
        $crate::program!(@bound [$($bound)* $name] $($rest)*)
    }};

    (@bound [$($bound:ident)*] let $pattern:pat = $value:expr; $($rest:tt)*) => {{
        let $pattern = $value;
        $crate::program!(@bound [$($bound)*] $($rest)*)
    }};

    (@bound [$($bound:ident)*] $name:ident <= $step:expr; $($rest:tt)*) => {{
        let saved = $crate::program!(@save [$($bound)*]);
        $crate::Program::chain($step, move |value| {
            #[allow(unused_variables)]
            let saved = ::core::clone::Clone::clone(&saved);
            $crate::program!(@restore saved [$($bound)*]);
            let $name = value;
            $crate::program!(@bound [$($bound)* $name] $($rest)*)
        })
    }};

    (@bound [$($bound:ident)*] $step:expr; $($rest:tt)+) => {{
        let saved = $crate::program!(@save [$($bound)*]);
        $crate::Program::chain($step, move |_| {
            #[allow(unused_variables)]
            let saved = ::core::clone::Clone::clone(&saved);
            $crate::program!(@restore saved [$($bound)*]);
            $crate::program!(@bound [$($bound)*] $($rest)+)
        })
    }};

    (@bound [$($bound:ident)*] $step:expr;) => {
        $crate::Program::void($step)
    };

    (@bound [$($bound:ident)*] $step:expr) => {
        $step
    };

    (@save []) => {
        ()
    };

    (@save [$head:ident $($tail:ident)*]) => {
        (::core::clone::Clone::clone(&$head), $crate::program!(@save [$($tail)*]))
    };

    (@restore $saved:ident []) => {};

    (@restore $saved:ident [$head:ident $($tail:ident)*]) => {
        #[allow(unused_variables)]
        let ($head, $saved) = $saved;
        $crate::program!(@restore $saved [$($tail)*]);
    };

    (@bound [$($bound:ident)*] $($rest:tt)*) => {
        ::core::compile_error!(::core::concat!(
            "program!: expected `name <= program;`, `let`, `program;` or `return`, found `",
            ::core::stringify!($($rest)*),
            "`"
        ))
    };

    ($($statements:tt)*) => {
        $crate::program!(@bound [] $($statements)*)
    };
}
