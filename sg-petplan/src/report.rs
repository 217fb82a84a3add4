//! The nutrition report hierarchy.
//!
//! These are the typed targets of the structuring workflow and the shape of
//! the final produced artifact. JSON schemas derived here are handed to the
//! model as structured-output contracts.

use std::collections::BTreeMap;

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Macronutrient breakdown, in grams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Macronutrients {
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbohydrates_g: f64,
    pub dietary_fiber_g: f64,
}

/// Micronutrient breakdown, in milligrams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Micronutrients {
    pub vitamin_a_mg: f64,
    pub vitamin_c_mg: f64,
    pub vitamin_d_mg: f64,
    pub calcium_mg: f64,
    pub iron_mg: f64,
    pub sodium_mg: f64,
    pub potassium_mg: f64,
    pub cholesterol_mg: f64,
    /// Any further nutrients worth calling out.
    #[serde(default)]
    pub additional_nutrients: BTreeMap<String, f64>,
}

/// One food item of a meal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FoodItem {
    pub name: String,
    pub weight_g: f64,
    pub macro_nutrients: Macronutrients,
    pub micro_nutrients: Micronutrients,
    pub recommend_reason: String,
}

/// One meal of the day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SingleMealPlan {
    /// Which meal of the day this is (1-based).
    pub order: u32,
    pub time: String,
    pub food_items: Vec<FoodItem>,
    pub cook_method: String,
}

/// One day's meals; a week keeps the same daily menu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyDietPlan {
    pub meals: Vec<SingleMealPlan>,
}

/// One structured weekly plan — the unit the structuring workflow extracts
/// from a diet-plan note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeeklyDietPlan {
    /// Which week of the month this plan covers (1-based).
    pub week: u32,
    pub diet_adjustment_principle: String,
    pub daily_plan: DailyDietPlan,
    pub special_adjustment_note: String,
    pub suggestions: Vec<String>,
}

/// The month: up to four differentiated weeks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyDietPlan {
    pub weeks: Vec<WeeklyDietPlan>,
}

/// The pet profile a run plans for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PetInformation {
    pub pet_type: String,
    pub pet_breed: String,
    pub age: String,
    pub pet_weight_kg: f64,
    pub pet_health_status: String,
}

/// The produced artifact of one completed run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PetDietPlan {
    pub pet_information: PetInformation,
    /// The planner's closing summary, taken from its final message.
    pub ai_suggestions: String,
    pub diet_plan: MonthlyDietPlan,
}

/// JSON schema for structured extraction of one weekly plan.
#[must_use]
pub fn weekly_plan_schema() -> Value {
    serde_json::to_value(schema_for!(WeeklyDietPlan)).expect("schema serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_plan_schema_names_required_fields() {
        let schema = weekly_plan_schema();
        let required = schema["required"]
            .as_array()
            .expect("schema has required list");
        let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
        assert!(names.contains(&"week"));
        assert!(names.contains(&"daily_plan"));
    }

    #[test]
    fn report_round_trips() {
        let plan = WeeklyDietPlan {
            week: 1,
            diet_adjustment_principle: "high protein recovery".into(),
            daily_plan: DailyDietPlan { meals: vec![] },
            special_adjustment_note: "none".into(),
            suggestions: vec!["fresh water".into()],
        };
        let json = serde_json::to_string(&plan).unwrap();
        let back: WeeklyDietPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }
}
