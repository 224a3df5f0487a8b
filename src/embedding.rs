//! Embedding pseudo-semántico basado en hashing, 100% offline.
//!
//! No es un modelo aprendido: para cada dimensión se calcula un digest MD5
//! de `"{texto}_{i}"`, se interpreta el prefijo de 4 bytes como entero y se
//! reescala linealmente a [-1, 1]. El vector resultante se normaliza a
//! longitud euclídea 1. Cualquier función de embedding con la misma firma
//! puede sustituir a esta sin tocar el resto del sistema.

/// Dimensión fija de los vectores producidos.
pub const EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    /// Convierte un texto en un vector determinista de [`EMBEDDING_DIM`]
    /// componentes, de norma unitaria salvo que el vector crudo sea cero.
    pub fn embed(&self, text: &str) -> Vec<f64> {
        let mut vector = Vec::with_capacity(EMBEDDING_DIM);
        for i in 0..EMBEDDING_DIM {
            let digest = md5::compute(format!("{text}_{i}"));
            let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
            // prefix / 2^32 cae en [0, 1); reescalado a [-1, 1)
            vector.push((f64::from(prefix) / 4_294_967_296.0) * 2.0 - 1.0);
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }
        vector
    }
}
