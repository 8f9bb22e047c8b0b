use serde::{Deserialize, Serialize};

/// Cached snapshot of a single asset unit belonging to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivoUnidad {
    pub id: i64,
    pub activo_modelo_id: i64,
    #[serde(default)]
    pub codigo: String,
    #[serde(default)]
    pub estado_actual: String,
    #[serde(default)]
    pub asignado: bool,
}

/// Cached snapshot of a server-owned asset model. The server assigns ids;
/// one snapshot per id per cache partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivoModelo {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub costo: f64,
    #[serde(default)]
    pub estado_actual: String,
    #[serde(default)]
    pub asignado: bool,
    #[serde(default)]
    pub unidades: Vec<ActivoUnidad>,
}

impl ActivoModelo {
    /// Two-level merge: scalar fields are replaced wholesale by the incoming
    /// snapshot, while `unidades` is merged by id. Sub-units already present
    /// are overwritten in place, unseen ones are appended.
    pub fn merge_from(&mut self, incoming: ActivoModelo) {
        self.nombre = incoming.nombre;
        self.descripcion = incoming.descripcion;
        self.costo = incoming.costo;
        self.estado_actual = incoming.estado_actual;
        self.asignado = incoming.asignado;

        for unidad in incoming.unidades {
            match self.unidades.iter_mut().find(|u| u.id == unidad.id) {
                Some(existing) => *existing = unidad,
                None => self.unidades.push(unidad),
            }
        }
    }
}
