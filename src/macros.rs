/// Retorna un error asociado a una ubicación.
macro_rules! fail {
    ($location:expr, $error:expr) => {
        return Err(crate::source::Located::at($error, Clone::clone($location)))
    };
}

/// Agrega una instrucción al cuerpo que se está generando.
macro_rules! emit {
    ($context:expr, $instruction:expr) => {
        $context.output().push($instruction)
    };
}
