pub use enclose::*;

/// Creates and runs an effect, cloning the listed captures into it.
///
/// ```ignore
/// let state = Reactive::object().reactive();
/// let e = effect!((state) => { state.get("count"); });
/// ```
#[macro_export]
macro_rules! effect {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::effect($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::effect(move || { $($b)* })
    };
}

/// Like [`effect!`], but the effect is created lazily.
#[macro_export]
macro_rules! lazy_effect {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::effect_with(
            $crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }),
            $crate::EffectOptions::default().lazy(),
        )
    };
    (=> $($b:tt)*) => {
        $crate::effect_with(move || { $($b)* }, $crate::EffectOptions::default().lazy())
    };
}
